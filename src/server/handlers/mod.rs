pub mod agents;
pub mod datasets;
pub mod documents;
pub mod history;
pub mod settings;
pub mod workflows;
