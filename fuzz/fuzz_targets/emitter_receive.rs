//! Inbound events from any origin never panic the emitter, and only a
//! handshake from the expected origin opens the ready gate.

#![no_main]

use libfuzzer_sys::fuzz_target;
use paywall_core::{
    channel::MessageChannel,
    emitter::Emitter,
    error::TransportError,
    transport::{RawEvent, Transport},
};
use paywall_proto::Message;

const ORIGIN: &str = "https://app.unlock-protocol.com";

struct Discard;

impl Transport for Discard {
    fn post(&mut self, _data: String, _target_origin: &str) -> Result<(), TransportError> {
        Ok(())
    }
}

fuzz_target!(|input: (bool, &[u8])| {
    let (trusted, data) = input;
    let origin = if trusted { ORIGIN } else { "https://evil.example" };
    let mut emitter = Emitter::new(MessageChannel::new(Discard, ORIGIN));
    emitter.on(Message::Handshake.kind(), |_| Ok(()));

    let event = RawEvent::new(origin, String::from_utf8_lossy(data));
    let received = emitter.receive(&event);
    if !trusted {
        assert!(received.is_none());
    }
    if let Some(Message::Handshake) = received {
        assert!(emitter.set_ready());
    }
});
