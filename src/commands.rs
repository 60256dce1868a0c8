use crate::session::{Category, SessionState};

/// Named actions the presentation layer can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum Command {
    Start,
    Finish,
    Reset,
    RecordSuccess,
    RecordFail,
    Save,
    /// Register-or-reuse the pending site label and select it
    AddCategory,
    /// Register-or-reuse the pending outlet label and select it
    SetCategory,
}

impl Command {
    pub const ALL: [Command; 8] = [
        Command::Start,
        Command::Finish,
        Command::Reset,
        Command::RecordSuccess,
        Command::RecordFail,
        Command::Save,
        Command::AddCategory,
        Command::SetCategory,
    ];

    /// The registry a label command writes to
    pub fn category(&self) -> Option<Category> {
        match self {
            Command::AddCategory => Some(Category::Site),
            Command::SetCategory => Some(Category::Outlet),
            _ => None,
        }
    }
}

/// Text typed into the label inputs but not yet committed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingInput {
    pub site: String,
    pub outlet: String,
}

impl PendingInput {
    pub fn get(&self, kind: Category) -> &str {
        match kind {
            Category::Site => &self.site,
            Category::Outlet => &self.outlet,
        }
    }

    pub fn get_mut(&mut self, kind: Category) -> &mut String {
        match kind {
            Category::Site => &mut self.site,
            Category::Outlet => &mut self.outlet,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    pub command: Command,
    pub enabled: bool,
}

pub fn can_save(state: &SessionState) -> bool {
    !state.running && state.total() > 0 && state.site.is_some() && state.outlet.is_some()
}

/// Whether `command` may run against the current state
pub fn is_enabled(command: Command, state: &SessionState, pending: &PendingInput) -> bool {
    match command {
        Command::Start => !state.running,
        Command::Finish => state.running,
        Command::Reset => true,
        Command::RecordSuccess | Command::RecordFail => state.running,
        Command::Save => can_save(state),
        Command::AddCategory | Command::SetCategory => command
            .category()
            .is_some_and(|kind| !pending.get(kind).trim().is_empty()),
    }
}

pub fn statuses(state: &SessionState, pending: &PendingInput) -> Vec<CommandStatus> {
    Command::ALL
        .iter()
        .map(|&command| CommandStatus {
            command,
            enabled: is_enabled(command, state, pending),
        })
        .collect()
}
