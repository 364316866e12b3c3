// Output device connection state

pub mod status;
