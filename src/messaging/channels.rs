// Communication channels
// Host → player: bounded crossbeam channel (the player blocks on it between timers)
// Player → audio thread: lock-free ring buffer

use crate::messaging::command::{AudioCommand, Command};
use ringbuf::{HeapRb, traits::Split};

pub type CommandSender = crossbeam_channel::Sender<Command>;
pub type CommandReceiver = crossbeam_channel::Receiver<Command>;

pub fn create_command_channel(capacity: usize) -> (CommandSender, CommandReceiver) {
    crossbeam_channel::bounded(capacity)
}

pub type AudioCommandProducer = ringbuf::HeapProd<AudioCommand>;
pub type AudioCommandConsumer = ringbuf::HeapCons<AudioCommand>;

pub fn create_audio_command_channel(
    capacity: usize,
) -> (AudioCommandProducer, AudioCommandConsumer) {
    let rb = HeapRb::<AudioCommand>::new(capacity);
    rb.split()
}
