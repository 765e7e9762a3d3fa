mod common;
mod test_control;
mod test_fsm;
mod test_interactions;
