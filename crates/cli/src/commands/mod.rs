pub mod agent;
pub mod config_cmd;
pub mod doctor;
pub mod lookup;
pub mod serve;
