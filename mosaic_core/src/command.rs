//! Request front-end: validates a wall request and mounts the session.

use crate::catalog::CatalogProvider;
use crate::error::RequestError;
use crate::registry::{SessionRegistry, SessionSummary};
use mosaic_env::{Category, MosaicContext, ViewerId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Who issued a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requester {
    /// The server console: every permission, but nothing to show a wall to.
    Console,
    Viewer { id: ViewerId, permissions: Vec<String> },
}

impl Requester {
    pub fn has_permission(&self, node: &str) -> bool {
        match self {
            Requester::Console => true,
            Requester::Viewer { permissions, .. } => permissions.iter().any(|p| p == node),
        }
    }
}

pub struct SessionCommand<Ctx: MosaicContext> {
    catalog: Arc<dyn CatalogProvider>,
    registry: Arc<SessionRegistry<Ctx>>,
}

impl<Ctx: MosaicContext> SessionCommand<Ctx> {
    pub fn new(catalog: Arc<dyn CatalogProvider>, registry: Arc<SessionRegistry<Ctx>>) -> Self {
        Self { catalog, registry }
    }

    fn category_names() -> String {
        Category::ALL.iter().map(|c| c.name()).collect::<Vec<_>>().join(", ")
    }

    /// Validates the request, then registers and shows a wall for the
    /// requested category.
    pub fn execute(&self, requester: &Requester, args: &[&str]) -> Result<SessionSummary, RequestError> {
        let config = self.registry.config();

        let Requester::Viewer { id: viewer, .. } = requester else {
            return Err(RequestError::NotAViewer);
        };

        if !requester.has_permission(&config.permission_node) {
            return Err(RequestError::MissingPermission);
        }

        let [argument] = args else {
            return Err(RequestError::Usage {
                label: config.command_label.clone(),
                choices: Self::category_names(),
            });
        };

        let category: Category = argument
            .parse()
            .map_err(RequestError::UnknownCategory)?;

        let items = self.catalog.items(category);
        if items.is_empty() {
            return Err(RequestError::EmptyCategory(category));
        }

        let summary = self.registry.create_and_register(*viewer, items)?;
        if let Some(Err(e)) = self.registry.with_session(*viewer, |session, painter| session.show(painter)) {
            warn!(viewer = %viewer, "Failed to show wall: {}", e);
        }
        debug!(viewer = %viewer, %category, "Mounted wall");
        Ok(summary)
    }

    /// Runs the request and reports the outcome to the requester.
    pub fn run(&self, requester: &Requester, args: &[&str]) -> Option<SessionSummary> {
        let result = self.execute(requester, args);
        let Requester::Viewer { id: viewer, .. } = requester else {
            if let Err(e) = &result {
                warn!("Console request rejected: {}", e);
            }
            return result.ok();
        };

        let viewers = &self.registry.viewers;
        match result {
            Ok(summary) => {
                viewers.notify(*viewer, &format!("Your selected category holds {} items.", summary.item_count));
                viewers.notify(*viewer, &format!("Showing page 1/{}", summary.number_of_pages));
                viewers.notify(*viewer, "Primary action to request an item, secondary action to print infos");
                Some(summary)
            }
            Err(e) => {
                viewers.notify(*viewer, &e.to_string());
                None
            }
        }
    }

    /// Category suggestions for the first argument.
    pub fn complete(&self, requester: &Requester, args: &[&str]) -> Vec<String> {
        if !requester.has_permission(&self.registry.config().permission_node) || args.len() != 1 {
            return Vec::new();
        }

        let prefix = args[0].to_ascii_uppercase();
        Category::ALL
            .iter()
            .map(|c| c.name())
            .filter(|name| name.starts_with(&prefix))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::config::WallConfig;
    use crate::testing::{items, origin_pose, ManualClock, RecordingHost};

    fn setup() -> (Arc<RecordingHost>, SessionCommand<ManualClock>, Arc<SessionRegistry<ManualClock>>) {
        let host = RecordingHost::new();
        let registry = Arc::new(SessionRegistry::new(
            Arc::new(ManualClock::default()),
            WallConfig::default(),
            host.clone(),
            host.clone(),
            host.clone(),
        )
        .unwrap());
        let catalog = InMemoryCatalog::from_items(items(45).into_iter().map(|i| (*i).clone()));
        (host, SessionCommand::new(Arc::new(catalog), registry.clone()), registry)
    }

    fn viewer(id: ViewerId) -> Requester {
        Requester::Viewer {
            id,
            permissions: vec!["mosaic.use".to_string()],
        }
    }

    #[test]
    fn test_successful_request_mounts_and_shows() {
        let (host, command, registry) = setup();
        let id = ViewerId::from_seed(1);
        host.set_pose(id, origin_pose());

        let summary = command.run(&viewer(id), &["animals"]).unwrap();

        assert_eq!(summary.number_of_pages, 2);
        assert!(registry.is_active(id));
        assert_eq!(host.sent().len(), 240);
        assert_eq!(host.messages(id)[1], "Showing page 1/2");
    }

    #[test]
    fn test_request_errors() {
        let (host, command, registry) = setup();
        let id = ViewerId::from_seed(1);
        host.set_pose(id, origin_pose());

        assert_eq!(command.execute(&Requester::Console, &["animals"]), Err(RequestError::NotAViewer));
        assert_eq!(
            command.execute(&Requester::Viewer { id, permissions: vec![] }, &["animals"]),
            Err(RequestError::MissingPermission)
        );
        assert!(matches!(command.execute(&viewer(id), &[]), Err(RequestError::Usage { .. })));
        assert!(matches!(command.execute(&viewer(id), &["a", "b"]), Err(RequestError::Usage { .. })));
        assert_eq!(
            command.execute(&viewer(id), &["dragons"]),
            Err(RequestError::UnknownCategory("dragons".to_string()))
        );
        assert_eq!(
            command.execute(&viewer(id), &["plants"]),
            Err(RequestError::EmptyCategory(Category::Plants))
        );
        assert!(registry.is_empty());
        assert!(host.sent().is_empty());

        command.execute(&viewer(id), &["animals"]).unwrap();
        assert_eq!(command.execute(&viewer(id), &["animals"]), Err(RequestError::AlreadyActive));
    }

    #[test]
    fn test_usage_lists_categories() {
        let (host, command, _) = setup();
        let id = ViewerId::from_seed(1);
        host.set_pose(id, origin_pose());

        command.run(&viewer(id), &[]);
        let usage = &host.messages(id)[0];
        assert!(usage.starts_with("Usage: /wall <ALPHABET, ANIMALS"));
        assert!(usage.ends_with("PLANTS>"));
    }

    #[test]
    fn test_completion() {
        let (_, command, _) = setup();
        let id = ViewerId::from_seed(1);

        assert_eq!(command.complete(&viewer(id), &[""]).len(), 10);
        assert_eq!(command.complete(&viewer(id), &["hu"]), vec!["HUMANS".to_string(), "HUMANOID".to_string()]);
        assert!(command.complete(&viewer(id), &["a", ""]).is_empty());
        assert!(command
            .complete(&Requester::Viewer { id, permissions: vec![] }, &[""])
            .is_empty());
    }
}
