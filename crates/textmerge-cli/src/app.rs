use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::widgets::ListState;
use textmerge_engine::{
    EditMode, EditServiceError, MergeSession, RangeEditResult, RangeEditService, RangeEditTicket,
    run_range_edit,
};

type EditOutcome = (
    RangeEditTicket,
    Result<Option<Vec<RangeEditResult>>, EditServiceError>,
);

/// How the user left the app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Write,
    Discard,
}

pub struct App {
    pub session: MergeSession,
    source: String,
    pub list_state: ListState,
    pub status: String,
    pub mode: EditMode,
    pub exit: Option<Exit>,
    editor: Option<Arc<dyn RangeEditService>>,
    runtime: Option<tokio::runtime::Handle>,
    outcome_tx: Sender<EditOutcome>,
    outcome_rx: Receiver<EditOutcome>,
}

impl App {
    pub fn new(session: MergeSession, source: String, mode: EditMode) -> Self {
        let (outcome_tx, outcome_rx) = channel();
        let mut list_state = ListState::default();
        if !session.current_segments().is_empty() {
            list_state.select(Some(0));
        }

        let mut app = Self {
            session,
            source,
            list_state,
            status: String::new(),
            mode,
            exit: None,
            editor: None,
            runtime: None,
            outcome_tx,
            outcome_rx,
        };
        app.status = app.summary();
        app
    }

    /// Enable range edits through `editor`, spawning requests on `runtime`
    pub fn with_editor(
        mut self,
        editor: Arc<dyn RangeEditService>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        self.editor = Some(editor);
        self.runtime = Some(runtime);
        self
    }

    pub fn preview(&self) -> String {
        self.session.preview_text()
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('q') => self.exit = Some(Exit::Discard),
            KeyCode::Char('w') => self.exit = Some(Exit::Write),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_selected(),
            KeyCode::Char('a') => self.choice(MergeSession::accept_all, "accepted all changes"),
            KeyCode::Char('r') if ctrl => self.choice(MergeSession::redo, "redo"),
            KeyCode::Char('r') => self.choice(MergeSession::reject_all, "rejected all changes"),
            KeyCode::Char('u') => self.choice(MergeSession::undo, "undo"),
            KeyCode::Char('U') => self.choice(MergeSession::redo, "redo"),
            KeyCode::Char('s') => self.select_range(true),
            KeyCode::Char('S') => self.select_range(false),
            KeyCode::Char('c') => {
                self.session.cancel_range_edit();
                self.session.clear_ranges();
                self.status = "cleared ranges".to_string();
            }
            KeyCode::Char('m') => self.cycle_mode(),
            KeyCode::Char('e') => self.start_range_edit(),
            KeyCode::Esc => {
                if self.session.cancel_range_edit() {
                    self.status = "range edit cancelled".to_string();
                }
            }
            _ => {}
        }
    }

    /// Pick up a finished range edit, if one has arrived
    pub fn poll_range_edit(&mut self) {
        while let Ok((ticket, answer)) = self.outcome_rx.try_recv() {
            self.finish_range_edit(ticket, answer);
        }
    }

    pub fn summary(&self) -> String {
        let stats = self.session.stats();
        format!(
            "+{}/{} accepted, -{}/{} kept, {} range(s), mode: {}",
            stats.added_included,
            stats.added,
            stats.removed_included,
            stats.removed,
            self.session.current_ranges().len(),
            self.mode
        )
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.session.current_segments().len();
        if len == 0 {
            return;
        }
        let current = self.list_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(len as isize) as usize;
        self.list_state.select(Some(next));
    }

    fn selected_id(&self) -> Option<textmerge_engine::SegmentId> {
        let index = self.list_state.selected()?;
        self.session.current_segments().get(index).map(|s| s.id)
    }

    fn toggle_selected(&mut self) {
        if let Some(id) = self.selected_id() {
            self.choice(|session| session.toggle(id), "toggled segment");
        }
    }

    /// Run a merge choice. Changing the preview invalidates every captured range and
    /// any range edit still running against the old preview.
    fn choice(&mut self, action: impl FnOnce(&mut MergeSession) -> bool, done: &str) {
        if action(&mut self.session) {
            if self.session.cancel_range_edit() {
                log::info!("{done} cancelled the running range edit");
            }
            self.session.clear_ranges();
            self.status = format!("{done}: {}", self.summary());
        } else {
            self.status = format!("nothing to {done}");
        }
    }

    fn select_range(&mut self, additive: bool) {
        let Some(span) = self.selected_id().and_then(|id| self.session.preview_span(id)) else {
            self.status = "segment is not part of the preview".to_string();
            return;
        };

        let preview = self.preview();
        match self.session.add_range(span.start, span.end, additive, &preview) {
            Ok(Some(id)) => self.status = format!("selected {id}: {}", self.summary()),
            Ok(None) => {}
            Err(error) => self.status = format!("could not select range: {error}"),
        }
    }

    fn cycle_mode(&mut self) {
        let index = EditMode::ALL
            .iter()
            .position(|mode| *mode == self.mode)
            .unwrap_or(0);
        self.mode = EditMode::ALL[(index + 1) % EditMode::ALL.len()];
        self.status = format!("edit mode: {}", self.mode);
    }

    fn start_range_edit(&mut self) {
        let (Some(editor), Some(runtime)) = (self.editor.clone(), self.runtime.clone()) else {
            self.status = "no edit command configured (--edit-command)".to_string();
            return;
        };
        if self.session.current_ranges().is_empty() {
            self.status = "select at least one range first (s)".to_string();
            return;
        }

        let preview = self.preview();
        let ticket = self.session.begin_range_edit(&preview);
        let mode = self.mode;
        let tx = self.outcome_tx.clone();
        self.status = format!("running {mode} edit on {} range(s)...", ticket.ranges().len());

        runtime.spawn(async move {
            let answer = run_range_edit(editor.as_ref(), &ticket, mode).await;
            let _ = tx.send((ticket, answer));
        });
    }

    fn finish_range_edit(
        &mut self,
        ticket: RangeEditTicket,
        answer: Result<Option<Vec<RangeEditResult>>, EditServiceError>,
    ) {
        if self.session.pending_generation() != Some(ticket.generation()) {
            log::debug!(
                "dropping answer for superseded range edit generation {}",
                ticket.generation()
            );
            return;
        }

        let results = match answer {
            Ok(Some(results)) => results,
            Ok(None) => {
                self.status = "range edit cancelled".to_string();
                return;
            }
            Err(error) => {
                self.session.cancel_range_edit();
                self.status = format!("range edit failed: {error}");
                return;
            }
        };

        match self.session.complete_range_edit(ticket, &results) {
            Ok(Some(patched)) => match self.session.run_diff(&self.source, &patched) {
                Ok(()) => {
                    self.list_state.select(Some(0));
                    self.status = format!("applied {} edit(s): {}", results.len(), self.summary());
                }
                Err(error) => self.status = format!("could not re-diff edited text: {error}"),
            },
            Ok(None) => self.status = "discarded stale range edit".to_string(),
            Err(error) => self.status = format!("could not apply range edit: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn sky_app() -> App {
        let mut session = MergeSession::new();
        session
            .run_diff("The sky was red.", "The sky was blue today.")
            .unwrap();
        App::new(session, "The sky was red.".to_string(), EditMode::default())
    }

    #[test]
    fn test_toggle_undo_redo_keys() {
        let mut app = sky_app();

        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Char(' ')));
        assert_eq!(app.preview(), "The sky was red.");

        app.handle_key(key(KeyCode::Char('u')));
        assert_eq!(app.preview(), "The sky was blue today.");

        app.handle_key(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL));
        assert_eq!(app.preview(), "The sky was red.");
    }

    #[test]
    fn test_accept_and_reject_keys() {
        let mut app = sky_app();

        app.handle_key(key(KeyCode::Char('r')));
        assert_eq!(app.preview(), "The sky was red.");

        app.handle_key(key(KeyCode::Char('a')));
        assert_eq!(app.preview(), "The sky was blue today.");
    }

    #[test]
    fn test_selection_wraps_around() {
        let mut app = sky_app();

        app.handle_key(key(KeyCode::Up));

        assert_eq!(app.list_state.selected(), Some(3));
    }

    #[test]
    fn test_select_range_uses_preview_span() {
        let mut app = sky_app();
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Down));

        app.handle_key(key(KeyCode::Char('s')));

        let ranges: Vec<&str> = app
            .session
            .current_ranges()
            .iter()
            .map(|r| r.text.as_str())
            .collect();
        assert_eq!(ranges, vec!["blue today"]);
    }

    #[test]
    fn test_choice_clears_ranges() {
        let mut app = sky_app();
        app.handle_key(key(KeyCode::Char('s')));
        assert_eq!(app.session.current_ranges().len(), 1);

        app.handle_key(key(KeyCode::Char('r')));

        assert!(app.session.current_ranges().is_empty());
    }

    #[test]
    fn test_edit_without_command_reports_status() {
        let mut app = sky_app();
        app.handle_key(key(KeyCode::Char('s')));

        app.handle_key(key(KeyCode::Char('e')));

        assert!(app.status.contains("--edit-command"));
        assert!(!app.session.has_pending_range_edit());
    }

    #[test]
    fn test_finished_edit_is_rediffed_against_source() {
        let mut app = sky_app();
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Char('s')));
        let range = app.session.current_ranges()[0].id;
        let preview = app.preview();
        let ticket = app.session.begin_range_edit(&preview);

        app.finish_range_edit(ticket, Ok(Some(vec![RangeEditResult::new(range, "grey")])));

        assert_eq!(app.preview(), "The sky was grey.");
        assert!(app.session.current_ranges().is_empty());
        app.handle_key(key(KeyCode::Char('r')));
        assert_eq!(app.preview(), "The sky was red.");
    }

    #[test]
    fn test_failed_edit_keeps_ranges() {
        let mut app = sky_app();
        app.handle_key(key(KeyCode::Char('s')));
        let preview = app.preview();
        let ticket = app.session.begin_range_edit(&preview);

        app.finish_range_edit(ticket, Err(anyhow::anyhow!("offline").into()));

        assert!(app.status.contains("offline"));
        assert_eq!(app.session.current_ranges().len(), 1);
        assert!(!app.session.has_pending_range_edit());
    }

    #[test]
    fn test_choice_during_edit_discards_late_answer() {
        let mut app = sky_app();
        app.handle_key(key(KeyCode::Char('s')));
        let range = app.session.current_ranges()[0].id;
        let preview = app.preview();
        let ticket = app.session.begin_range_edit(&preview);

        app.handle_key(key(KeyCode::Char('r')));
        assert!(!app.session.has_pending_range_edit());
        app.finish_range_edit(ticket, Ok(Some(vec![RangeEditResult::new(range, "A")])));

        assert_eq!(app.preview(), "The sky was red.");
        assert!(app.session.can_undo());
    }

    #[test]
    fn test_clear_cancels_running_edit() {
        let mut app = sky_app();
        app.handle_key(key(KeyCode::Char('s')));
        let preview = app.preview();
        let ticket = app.session.begin_range_edit(&preview);

        app.handle_key(key(KeyCode::Char('c')));

        assert!(ticket.is_cancelled());
        assert!(!app.session.has_pending_range_edit());
    }

    #[test]
    fn test_old_failure_does_not_cancel_newer_edit() {
        let mut app = sky_app();
        app.handle_key(key(KeyCode::Char('s')));
        let preview = app.preview();
        let old = app.session.begin_range_edit(&preview);
        let new = app.session.begin_range_edit(&preview);
        app.status = "running".to_string();

        app.finish_range_edit(old, Err(anyhow::anyhow!("offline").into()));

        assert_eq!(app.session.pending_generation(), Some(new.generation()));
        assert!(!new.is_cancelled());
        assert_eq!(app.status, "running");
    }

    #[test]
    fn test_quit_keys() {
        let mut app = sky_app();
        app.handle_key(key(KeyCode::Char('w')));
        assert_eq!(app.exit, Some(Exit::Write));

        app.handle_key(key(KeyCode::Char('q')));
        assert_eq!(app.exit, Some(Exit::Discard));
    }

    #[test]
    fn test_mode_cycles() {
        let mut app = sky_app();

        app.handle_key(key(KeyCode::Char('m')));

        assert_eq!(app.mode, EditMode::Proofread);
    }
}
