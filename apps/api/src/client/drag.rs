//! Drag Interaction Adapter: turns a card drop into a stage transition.
//!
//! Rollback on failure already happened inside the cache by the time an error
//! reaches this layer, so the adapter only logs and re-raises.

use tracing::{debug, error, info};

use crate::client::store::PipelineStore;
use crate::client::{ApplicationApi, ClientError};
use crate::models::application::{JobApplication, PipelineStage};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DragState {
    pub dragged: Option<JobApplication>,
    pub drag_over: Option<PipelineStage>,
    pub is_dragging: bool,
}

impl DragState {
    pub fn start(&mut self, application: JobApplication) {
        self.dragged = Some(application);
        self.drag_over = None;
        self.is_dragging = true;
    }

    pub fn enter(&mut self, stage: PipelineStage) {
        if self.is_dragging {
            self.drag_over = Some(stage);
        }
    }

    pub fn cancel(&mut self) {
        *self = DragState::default();
    }
}

pub struct DragAndDrop<'a, A> {
    store: &'a PipelineStore<A>,
    state: DragState,
}

impl<'a, A: ApplicationApi> DragAndDrop<'a, A> {
    pub fn new(store: &'a PipelineStore<A>) -> Self {
        Self {
            store,
            state: DragState::default(),
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn start(&mut self, application: JobApplication) {
        self.state.start(application);
    }

    pub fn enter(&mut self, stage: PipelineStage) {
        self.state.enter(stage);
    }

    pub fn cancel(&mut self) {
        self.state.cancel();
    }

    /// Ends the drag over `target`. The drag state is reset before the move
    /// is attempted; a drop with nothing dragged does nothing.
    pub async fn drop_on(&mut self, target: PipelineStage) -> Result<(), ClientError> {
        let dragged = self.state.dragged.take();
        self.state.cancel();
        match dragged {
            Some(application) => self.move_application(&application, target).await,
            None => Ok(()),
        }
    }

    /// Moves `application` to `target`. Dropping onto its own stage never
    /// reaches the transition path.
    pub async fn move_application(
        &self,
        application: &JobApplication,
        target: PipelineStage,
    ) -> Result<(), ClientError> {
        if application.stage == target {
            debug!("Job application already in target stage, no update needed");
            return Ok(());
        }

        info!(
            "Moving \"{}\" from {} to {target}",
            application.title, application.stage
        );

        self.store.clear_error();
        match self.store.stage_transition(&application.id, target).await {
            Ok(_) => {
                info!("Moved job application \"{}\" to {target}", application.title);
                Ok(())
            }
            Err(e) => {
                error!("Failed to update job application stage during drag and drop: {e}");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::client::store::tests::{create_req, seeded, ScriptedApi};

    #[tokio::test]
    async fn test_drop_on_origin_column_sends_nothing() {
        let store = PipelineStore::new(ScriptedApi::new());
        let app = seeded(&store, PipelineStage::Applied).await;
        let calls_before = store.api().updates();

        let dnd = DragAndDrop::new(&store);
        dnd.move_application(&app, PipelineStage::Applied)
            .await
            .unwrap();

        assert_eq!(store.api().updates(), calls_before);
        assert_eq!(store.get(&app.id).unwrap().stage_history.len(), 2);
    }

    #[tokio::test]
    async fn test_move_clears_stale_error_and_transitions() {
        let store = PipelineStore::new(ScriptedApi::new());
        let app = store.create(create_req("SWE", "Acme")).await.unwrap();
        let _ = store.add_note(&app.id, Default::default()).await;
        assert!(store.error().is_some());

        let dnd = DragAndDrop::new(&store);
        dnd.move_application(&app, PipelineStage::PhoneScreen)
            .await
            .unwrap();

        assert_eq!(store.error(), None);
        let moved = store.get(&app.id).unwrap();
        assert_eq!(moved.stage, PipelineStage::PhoneScreen);
        assert_eq!(
            moved.stage_history[1].from_stage,
            Some(PipelineStage::Researched)
        );
    }

    #[tokio::test]
    async fn test_failed_drop_reraises_after_rollback() {
        let store = PipelineStore::new(ScriptedApi::new());
        let app = seeded(&store, PipelineStage::Applied).await;
        store.api().fail_updates.store(true, Ordering::SeqCst);

        let mut dnd = DragAndDrop::new(&store);
        dnd.start(app.clone());
        dnd.enter(PipelineStage::Interview);
        assert!(dnd.state().is_dragging);

        let err = dnd.drop_on(PipelineStage::Interview).await.unwrap_err();

        assert!(matches!(err, ClientError::Api { .. }));
        assert_eq!(dnd.state(), &DragState::default());
        assert_eq!(store.get(&app.id).unwrap(), app);
        assert_eq!(
            store.error().as_deref(),
            Some("Failed to update job application stage")
        );
    }

    #[tokio::test]
    async fn test_drop_without_drag_is_noop() {
        let store = PipelineStore::new(ScriptedApi::new());
        let mut dnd = DragAndDrop::new(&store);
        dnd.drop_on(PipelineStage::Offer).await.unwrap();
        assert_eq!(store.api().updates(), 0);
    }

    #[test]
    fn test_enter_ignored_when_not_dragging() {
        let mut state = DragState::default();
        state.enter(PipelineStage::Final);
        assert_eq!(state.drag_over, None);
    }
}
