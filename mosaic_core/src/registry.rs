//! The session registry - at most one session per viewer.
//!
//! The map is touched from the tick thread (commands, scroll, exit,
//! sweep) and from the network-receive thread (intercepted client
//! actions, outgoing filter). It sits behind one mutex, and sessions are
//! only ever used while that lock is held, which serialises each viewer.

use crate::config::WallConfig;
use crate::error::{ConfigError, RequestError, SessionError};
use crate::painter::Painter;
use crate::session::Session;
use mosaic_env::{BlockFace, CatalogItem, DisplayChannel, MosaicContext, ViewerChannel, ViewerId, WorldView};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Snapshot of a freshly registered session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub viewer: ViewerId,
    pub item_count: usize,
    pub number_of_pages: usize,
    pub facing: BlockFace,
}

/// Scroll direction derived from a held-slot change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Forward,
    Backward,
}

impl ScrollDirection {
    /// Moving to a higher slot index scrolls forward.
    pub fn from_slots(previous: u8, new: u8) -> Self {
        if previous < new {
            ScrollDirection::Forward
        } else {
            ScrollDirection::Backward
        }
    }
}

pub struct SessionRegistry<Ctx: MosaicContext> {
    context: Arc<Ctx>,
    config: WallConfig,
    pub(crate) painter: Painter,
    pub(crate) viewers: Arc<dyn ViewerChannel>,
    sessions: Mutex<HashMap<ViewerId, Session>>,

    /// Clock reading of the last interaction that had an effect. Shared by
    /// every session, so one viewer's click also holds back everyone
    /// else's for the debounce window.
    last_interaction: Mutex<Option<Duration>>,
    shut_down: AtomicBool,
}

impl<Ctx: MosaicContext> SessionRegistry<Ctx> {
    /// Fails when `config` does not describe a usable wall.
    pub fn new(
        context: Arc<Ctx>,
        config: WallConfig,
        display: Arc<dyn DisplayChannel>,
        world: Arc<dyn WorldView>,
        viewers: Arc<dyn ViewerChannel>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            context,
            config,
            painter: Painter::new(display, world),
            viewers,
            sessions: Mutex::new(HashMap::new()),
            last_interaction: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn context(&self) -> &Arc<Ctx> {
        &self.context
    }

    pub fn config(&self) -> &WallConfig {
        &self.config
    }

    pub(crate) fn sessions(&self) -> MutexGuard<'_, HashMap<ViewerId, Session>> {
        // A panic elsewhere must not take every viewer's wall down with it.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    pub fn is_active(&self, viewer: ViewerId) -> bool {
        self.sessions().contains_key(&viewer)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Plans a session in front of the viewer's current pose and registers
    /// it. Nothing is painted yet.
    pub fn create_and_register(
        &self,
        viewer: ViewerId,
        items: Vec<Arc<CatalogItem>>,
    ) -> Result<SessionSummary, RequestError> {
        let mut sessions = self.sessions();
        if self.is_shut_down() {
            return Err(RequestError::ShuttingDown);
        }
        if sessions.contains_key(&viewer) {
            return Err(RequestError::AlreadyActive);
        }

        let pose = self.painter.world().pose_of(viewer).ok_or(RequestError::ViewerOffline)?;
        let session = Session::new(viewer, &pose, items, self.config.layout.clone());
        let summary = SessionSummary {
            viewer,
            item_count: session.item_count(),
            number_of_pages: session.number_of_pages(),
            facing: session.facing(),
        };

        sessions.insert(viewer, session);
        info!(%viewer, items = summary.item_count, pages = summary.number_of_pages, "Registered session");
        Ok(summary)
    }

    /// Records an interaction at the current clock reading unless the
    /// previous one, from any viewer, is less than the debounce window ago.
    /// Returns whether the interaction may take effect.
    pub(crate) fn accept_interaction(&self) -> bool {
        let now = self.context.now();
        let mut last = self.last_interaction.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = *last {
            if now.saturating_sub(previous) < self.config.interaction_debounce() {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    /// Runs `f` on the viewer's session, if there is one.
    pub fn with_session<R>(&self, viewer: ViewerId, f: impl FnOnce(&mut Session, &Painter) -> R) -> Option<R> {
        let mut sessions = self.sessions();
        sessions.get_mut(&viewer).map(|session| f(session, &self.painter))
    }

    /// Closes and removes every session whose viewer wandered off, left the
    /// world or disconnected. Returns the number of evicted sessions.
    pub fn sweep_distance_eviction(&self) -> usize {
        let threshold = self.config.removal_distance_squared();
        let mut evicted = 0;

        self.sessions().retain(|viewer, session| {
            let Some(pose) = self.painter.world().pose_of(*viewer) else {
                debug!(%viewer, "Viewer gone; dropping session");
                evicted += 1;
                return false;
            };

            match session.distance_squared_to(&pose) {
                Some(distance) if distance <= threshold => true,
                _ => {
                    self.viewers.notify(
                        *viewer,
                        &format!(
                            "You've exceeded the max distance of {}; exited session.",
                            self.config.removal_distance
                        ),
                    );
                    session.close(&self.painter);
                    evicted += 1;
                    false
                }
            }
        });

        if evicted > 0 {
            info!(evicted, "Distance sweep evicted sessions");
        }
        evicted
    }

    /// Scroll input: pages forward or backward and reports where it landed.
    pub fn on_scroll(&self, viewer: ViewerId, direction: ScrollDirection) {
        let Some((result, pages)) = self.with_session(viewer, |session, painter| {
            let result = match direction {
                ScrollDirection::Forward => session.next_page(painter),
                ScrollDirection::Backward => session.previous_page(painter),
            };
            (result, session.number_of_pages())
        }) else {
            return;
        };

        let message = match (direction, result) {
            (ScrollDirection::Forward, Ok(page)) => format!("Navigated to the next page, at {}/{}", page + 1, pages),
            (ScrollDirection::Backward, Ok(page)) => {
                format!("Navigated to the previous page, at {}/{}", page + 1, pages)
            }
            (_, Err(SessionError::AtLastPage(_))) => format!("You're already on the last page, at {}/{}", pages, pages),
            (_, Err(SessionError::AtFirstPage)) => format!("You're already on the first page, at 1/{}", pages),
            (_, Err(SessionError::Closed)) => return,
        };
        self.viewers.notify(viewer, &message);
    }

    /// Explicit exit gesture. Returns whether a session was ended.
    pub fn on_exit_gesture(&self, viewer: ViewerId) -> bool {
        let Some(mut session) = self.remove(viewer) else {
            return false;
        };
        self.viewers.notify(viewer, "Ending the wall session.");
        session.close(&self.painter);
        true
    }

    /// The viewer's connection is gone; there is no one left to restore for.
    pub fn on_disconnect(&self, viewer: ViewerId) {
        if self.remove(viewer).is_some() {
            debug!(%viewer, "Dropped session of disconnected viewer");
        }
    }

    /// Removes a session without touching the client. Removing twice is
    /// harmless, which is what lets teardown paths race.
    pub fn remove(&self, viewer: ViewerId) -> Option<Session> {
        self.sessions().remove(&viewer)
    }

    /// Closes and removes every session and stops the sweep loop.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);

        let drained: Vec<Session> = self.sessions().drain().map(|(_, session)| session).collect();
        if !drained.is_empty() {
            warn!(sessions = drained.len(), "Shutting down; restoring open walls");
        }
        for mut session in drained {
            session.close(&self.painter);
        }
    }
}
