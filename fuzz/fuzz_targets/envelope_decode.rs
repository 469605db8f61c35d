//! Arbitrary bytes never panic the decoder, and anything that decodes
//! re-encodes to an envelope that decodes to the same message.

#![no_main]

use libfuzzer_sys::fuzz_target;
use paywall_proto::Message;

fuzz_target!(|data: &[u8]| {
    let Ok(message) = Message::decode(data) else {
        return;
    };
    let encoded = message.encode().expect("decoded message must encode");
    let again = Message::decode(encoded.as_bytes()).expect("encoded message must decode");
    assert_eq!(again, message);
});
