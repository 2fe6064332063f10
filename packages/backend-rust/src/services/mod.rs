pub mod replay;
pub mod study_session;
