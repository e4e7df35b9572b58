//! Inbound side of the interception boundary.
//!
//! While a viewer has a session, every block-affecting action their client
//! sends is vetoed: the world never sees it. The client has already
//! predicted the outcome locally, so the affected cell is re-asserted, the
//! action is acknowledged, and only then is the click given meaning
//! (request an item, print its details).

use crate::registry::SessionRegistry;
use mosaic_env::{BlockFace, BlockPos, MosaicContext, ViewerId};
use tracing::{debug, trace};

/// What the client tried to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    /// Start/finish breaking the clicked block (primary action).
    Break { target: BlockPos },

    /// Use the held item on the clicked block (secondary action). `builds`
    /// is true when the held item would place content against `face`.
    UseOn { target: BlockPos, face: BlockFace, builds: bool },

    /// Use the held item into open space; carries no coordinate.
    UseInAir,
}

/// A client action together with the sequence number it must be
/// acknowledged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intent {
    pub sequence: i32,
    pub kind: IntentKind,
}

impl Intent {
    pub fn new(sequence: i32, kind: IntentKind) -> Self {
        Self { sequence, kind }
    }
}

impl IntentKind {
    /// The existing cell the client will have mutated locally.
    ///
    /// Placing content changes the neighbour on the clicked face, so that
    /// neighbour is the cell to re-assert.
    pub fn mutation_target(&self) -> Option<BlockPos> {
        match *self {
            IntentKind::Break { target } => Some(target),
            IntentKind::UseOn { target, face, builds: true } => Some(target.shifted(face, 1)),
            IntentKind::UseOn { target, builds: false, .. } => Some(target),
            IntentKind::UseInAir => None,
        }
    }

    /// The clicked cell and whether the click was the primary action.
    pub fn interaction(&self) -> Option<(BlockPos, bool)> {
        match *self {
            IntentKind::Break { target } => Some((target, true)),
            IntentKind::UseOn { target, .. } => Some((target, false)),
            IntentKind::UseInAir => None,
        }
    }
}

/// Whether a client action may reach the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Veto,
}

/// Whether a world-originated single-cell update may reach the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutgoingVerdict {
    Pass,
    Suppress,
}

impl<Ctx: MosaicContext> SessionRegistry<Ctx> {
    /// Handles a client action. Called from the network-receive thread.
    pub fn on_intent(&self, viewer: ViewerId, intent: Intent) -> Verdict {
        let mut sessions = self.sessions();
        let Some(session) = sessions.get_mut(&viewer) else {
            return Verdict::Pass;
        };

        // Unacknowledged actions make the client ignore all further block
        // updates, so this happens even though the action is dropped.
        self.painter.acknowledge(viewer, intent.sequence);

        if let Some(target) = intent.kind.mutation_target() {
            session.on_attempted_mutation(&self.painter, target);
        }

        self.viewers.resync_held_item(viewer);

        let Some((clicked, primary)) = intent.kind.interaction() else {
            return Verdict::Veto;
        };

        if !self.accept_interaction() {
            trace!(%viewer, %clicked, "Debounced interaction");
            return Verdict::Veto;
        }

        let Some(item) = session.cell_content_at(clicked).cloned() else {
            self.viewers.notify(
                viewer,
                "Please click directly on an item; primary action to request, secondary action for information, exit gesture to leave",
            );
            return Verdict::Veto;
        };

        if primary {
            debug!(%viewer, item = %item.id, "Granting item");
            self.viewers.grant(viewer, &item);
            self.viewers.notify(viewer, &format!("You've been given the item {}", item.name));
        } else {
            let separator = "------------------------------";
            self.viewers.notify(viewer, separator);
            self.viewers.notify(viewer, &format!("Name: {}", item.name));
            self.viewers.notify(viewer, &format!("Category: {}", item.category));
            self.viewers.notify(viewer, &format!("Tags: {}", item.tags.join(", ")));
            self.viewers.notify(viewer, separator);
        }

        Verdict::Veto
    }

    /// Decides whether a real single-cell update may be forwarded to the
    /// viewer. Cells under the viewer's wall keep their fake content.
    pub fn filter_outgoing(&self, viewer: ViewerId, pos: BlockPos) -> OutgoingVerdict {
        match self.sessions().get(&viewer) {
            Some(session) if session.covers(pos) => OutgoingVerdict::Suppress,
            _ => OutgoingVerdict::Pass,
        }
    }
}
