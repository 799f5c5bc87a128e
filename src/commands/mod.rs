pub mod check_config;
pub mod run;
pub mod send_test_email;

pub use check_config::handle_check_config;
pub use run::handle_run;
pub use send_test_email::handle_send_test_email;
