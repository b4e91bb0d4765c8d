//! A `mockall`-backed mock [`Handler`], gated behind the `mock` feature.
//!
//! Rather than hand-writing a stub for every test, dispatch-failure and
//! call-count assertions can use `mockall`'s expectation DSL directly.

use crate::error::HandlerError;
use crate::event::Event;
use crate::handler::Handler;

mockall::mock! {
    pub Handler {}

    impl Handler for Handler {
        fn handle(&self, event: &dyn Event) -> Result<(), HandlerError>;
        fn accepted_event_types(&self) -> Vec<std::any::TypeId>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_site::SourceSiteCell;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct TestEvent {
        site: SourceSiteCell,
    }
    impl Event for TestEvent {
        fn site_cell(&self) -> &SourceSiteCell {
            &self.site
        }
    }

    #[test]
    fn mock_handler_records_expected_call() {
        let mut mock = MockHandler::new();
        mock.expect_handle().times(1).returning(|_| Ok(()));
        let handler: Arc<dyn Handler> = Arc::new(mock);
        handler.handle(&TestEvent::default()).unwrap();
    }
}
