// Messaging - Host → player commands and player → audio thread commands

pub mod channels;
pub mod command;
pub mod host;
