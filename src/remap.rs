//! Layer-aware keystroke translation.
//!
//! Incoming events arrive in packets terminated by a synchronization event.
//! Each packet is translated under the currently active layer and then
//! either forwarded to the sink in full or dropped in full; a partial packet
//! is never emitted. Layer modifiers are consumed: their own press/release
//! events escape the packet instead of reaching the sink.

use std::collections::HashMap;

use libc::input_event;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{self, EV_KEY, EV_SYN, RELEASED};
use crate::keys::{self, IGNORED, MAX_KEYCODE};

/// Downstream consumer of translated event packets.
pub trait EventSink {
    /// Best-effort delivery of one packet of raw event bytes.
    fn consume(&mut self, bytes: &[u8]);
}

#[derive(Debug)]
pub struct Remapper {
    /// Code maps keyed by the activating modifier code; the base layer is
    /// under key 0.
    layers: HashMap<u16, Vec<u16>>,
    /// Layer that was active when each key was last pressed. A release is
    /// translated under the layer of its press, so a modifier released
    /// in between cannot split a press/release pair across code tables.
    pressed_layer: Vec<u16>,
    /// Code of the currently-held layer modifier, 0 when on the base layer.
    current_layer: u16,
}

fn resolve(name: &str) -> Result<u16> {
    keys::code_of(name).ok_or_else(|| Error::Config(format!("unknown key {name}")))
}

fn resolve_map(names: &HashMap<String, String>) -> Result<Vec<u16>> {
    let mut table: Vec<u16> = (0..=MAX_KEYCODE).collect();
    for (from, to) in names {
        table[resolve(from)? as usize] = resolve(to)?;
    }
    Ok(table)
}

impl Remapper {
    pub fn new(config: &Config) -> Result<Self> {
        let mut base = resolve_map(&config.map)?;

        let mut layers = HashMap::with_capacity(config.layers.len() + 1);
        for (modifier, names) in &config.layers {
            let modifier = resolve(modifier)?;
            // Modifier presses must never leak through on the base layer.
            base[modifier as usize] = IGNORED;
            layers.insert(modifier, resolve_map(names)?);
        }
        layers.insert(0, base);

        Ok(Self {
            layers,
            pressed_layer: vec![0; MAX_KEYCODE as usize + 1],
            current_layer: 0,
        })
    }

    /// Code map of `layer`, falling back to the base layer for a code that
    /// never had a table configured (reachable by mapping a key to
    /// `RESERVED` by hand).
    fn table(&self, layer: u16) -> &[u16] {
        self.layers.get(&layer).unwrap_or_else(|| &self.layers[&0])
    }

    /// Translates one packet in place. Returns false when the packet was
    /// escaped (a layer modifier changed state) and must be dropped.
    fn map_packet(&mut self, events: &mut [input_event]) -> bool {
        for ev in events.iter_mut() {
            if ev.type_ != EV_KEY {
                continue;
            }

            let key = ev.code;
            if key > MAX_KEYCODE {
                // Combo devices report BTN_* codes above the table range.
                continue;
            }
            let idx = key as usize;
            let released = ev.value == RELEASED;

            if released && self.current_layer == key {
                self.current_layer = 0;
                return false;
            }

            if !released && self.table(self.current_layer)[idx] == IGNORED {
                self.current_layer = key;
                return false;
            }

            if !released {
                self.pressed_layer[idx] = self.current_layer;
            }

            ev.code = if released && self.pressed_layer[idx] != self.current_layer {
                self.table(self.pressed_layer[idx])[idx]
            } else {
                self.table(self.current_layer)[idx]
            };
        }
        true
    }

    /// Translates a contiguous run of events and forwards every
    /// non-escaped packet to the sink. A trailing run with no terminating
    /// synchronization event is not a packet and stays unforwarded.
    pub fn on_keystroke(&mut self, events: &mut [input_event], sink: &mut dyn EventSink) {
        let mut from = 0;
        for i in 0..events.len() {
            if events[i].type_ != EV_SYN {
                continue;
            }
            let packet = &mut events[from..=i];
            if self.map_packet(packet) {
                sink.consume(event::as_bytes(packet));
            }
            from = i + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::test_util::{decode, key, syn};
    use crate::event::EV_REL;

    const KEY_A: u16 = 30;
    const KEY_B: u16 = 48;
    const KEY_X: u16 = 45;
    const KEY_H: u16 = 35;
    const KEY_LEFT: u16 = 105;
    const KEY_CAPSLOCK: u16 = 58;

    #[derive(Default)]
    struct TestSink {
        packets: Vec<Vec<(u16, u16, i32)>>,
    }

    impl EventSink for TestSink {
        fn consume(&mut self, bytes: &[u8]) {
            self.packets.push(decode(bytes));
        }
    }

    fn remapper(config: &str) -> Remapper {
        Remapper::new(&Config::parse(config).unwrap()).unwrap()
    }

    fn run(remapper: &mut Remapper, events: &mut [input_event]) -> Vec<Vec<(u16, u16, i32)>> {
        let mut sink = TestSink::default();
        remapper.on_keystroke(events, &mut sink);
        sink.packets
    }

    #[test]
    fn identity_by_default() {
        let mut remapper = remapper(r#"{ "keyboardNames": ["kb"] }"#);
        let mut events = [key(KEY_A, 1), syn(), key(KEY_A, 0), syn()];

        let packets = run(&mut remapper, &mut events);
        assert_eq!(
            packets,
            vec![
                vec![(EV_KEY, KEY_A, 1), (EV_SYN, 0, 0)],
                vec![(EV_KEY, KEY_A, 0), (EV_SYN, 0, 0)],
            ]
        );
    }

    #[test]
    fn base_remap() {
        let mut remapper = remapper(r#"{ "map": { "A": "B" }, "keyboardNames": ["kb"] }"#);
        let mut events = [key(KEY_A, 1), syn(), key(KEY_A, 0), syn()];

        let packets = run(&mut remapper, &mut events);
        assert_eq!(
            packets,
            vec![
                vec![(EV_KEY, KEY_B, 1), (EV_SYN, 0, 0)],
                vec![(EV_KEY, KEY_B, 0), (EV_SYN, 0, 0)],
            ]
        );
    }

    const LAYER_CONFIG: &str =
        r#"{ "layers": { "CAPSLOCK": { "H": "LEFT" } }, "keyboardNames": ["kb"] }"#;

    #[test]
    fn layer_activation_consumes_modifier() {
        let mut remapper = remapper(LAYER_CONFIG);
        let mut events = [
            key(KEY_CAPSLOCK, 1),
            syn(),
            key(KEY_H, 1),
            syn(),
            key(KEY_H, 0),
            syn(),
            key(KEY_CAPSLOCK, 0),
            syn(),
        ];

        let packets = run(&mut remapper, &mut events);
        assert_eq!(
            packets,
            vec![
                vec![(EV_KEY, KEY_LEFT, 1), (EV_SYN, 0, 0)],
                vec![(EV_KEY, KEY_LEFT, 0), (EV_SYN, 0, 0)],
            ]
        );
    }

    #[test]
    fn release_translates_under_press_time_layer() {
        let mut remapper = remapper(LAYER_CONFIG);
        let mut events = [
            key(KEY_CAPSLOCK, 1),
            syn(),
            key(KEY_H, 1),
            syn(),
            key(KEY_CAPSLOCK, 0),
            syn(),
            key(KEY_H, 0),
            syn(),
        ];

        let packets = run(&mut remapper, &mut events);
        assert_eq!(
            packets,
            vec![
                vec![(EV_KEY, KEY_LEFT, 1), (EV_SYN, 0, 0)],
                vec![(EV_KEY, KEY_LEFT, 0), (EV_SYN, 0, 0)],
            ]
        );
    }

    #[test]
    fn repeats_follow_the_active_layer() {
        let mut remapper = remapper(LAYER_CONFIG);
        let mut events = [
            key(KEY_CAPSLOCK, 1),
            syn(),
            key(KEY_H, 1),
            syn(),
            key(KEY_H, 2),
            syn(),
        ];

        let packets = run(&mut remapper, &mut events);
        assert_eq!(
            packets,
            vec![
                vec![(EV_KEY, KEY_LEFT, 1), (EV_SYN, 0, 0)],
                vec![(EV_KEY, KEY_LEFT, 2), (EV_SYN, 0, 0)],
            ]
        );
    }

    #[test]
    fn escaped_packet_is_dropped_in_full() {
        let mut remapper = remapper(LAYER_CONFIG);
        // H would be forwarded on its own, but it shares a packet with the
        // modifier press.
        let mut events = [key(KEY_H, 1), key(KEY_CAPSLOCK, 1), syn()];
        assert_eq!(run(&mut remapper, &mut events), Vec::<Vec<_>>::new());

        // The layer did activate.
        let mut events = [key(KEY_H, 2), syn()];
        let packets = run(&mut remapper, &mut events);
        assert_eq!(packets, vec![vec![(EV_KEY, KEY_LEFT, 2), (EV_SYN, 0, 0)]]);
    }

    #[test]
    fn non_key_events_pass_through() {
        let mut remapper = remapper(r#"{ "map": { "A": "B" }, "keyboardNames": ["kb"] }"#);
        let mut events = [
            key(KEY_A, 1),
            input_event {
                type_: EV_REL,
                code: 1,
                value: -3,
                ..event::zeroed()
            },
            syn(),
        ];

        let packets = run(&mut remapper, &mut events);
        assert_eq!(
            packets,
            vec![vec![(EV_KEY, KEY_B, 1), (EV_REL, 1, -3), (EV_SYN, 0, 0)]]
        );
    }

    #[test]
    fn codes_above_the_table_pass_through() {
        let btn_left = 0x110;
        let mut remapper = remapper(r#"{ "keyboardNames": ["kb"] }"#);
        let mut events = [key(btn_left, 1), syn(), key(btn_left, 0), syn()];

        let packets = run(&mut remapper, &mut events);
        assert_eq!(
            packets,
            vec![
                vec![(EV_KEY, btn_left, 1), (EV_SYN, 0, 0)],
                vec![(EV_KEY, btn_left, 0), (EV_SYN, 0, 0)],
            ]
        );
    }

    #[test]
    fn trailing_run_without_syn_is_not_forwarded() {
        let mut remapper = remapper(r#"{ "keyboardNames": ["kb"] }"#);
        let mut events = [key(KEY_A, 1)];
        assert_eq!(run(&mut remapper, &mut events), Vec::<Vec<_>>::new());
    }

    #[test]
    fn reserved_mapping_does_not_crash_translation() {
        // Mapping a key to RESERVED turns its press into a phantom layer
        // activation; later events translate under the base table.
        let mut remapper = remapper(r#"{ "map": { "X": "RESERVED" }, "keyboardNames": ["kb"] }"#);
        let mut events = [
            key(KEY_X, 1),
            syn(),
            key(KEY_A, 1),
            syn(),
            key(KEY_A, 0),
            syn(),
            key(KEY_X, 0),
            syn(),
        ];

        let packets = run(&mut remapper, &mut events);
        assert_eq!(
            packets,
            vec![
                vec![(EV_KEY, KEY_A, 1), (EV_SYN, 0, 0)],
                vec![(EV_KEY, KEY_A, 0), (EV_SYN, 0, 0)],
            ]
        );
    }

    #[test]
    fn unknown_names_are_config_errors() {
        for config in [
            r#"{ "map": { "NOT_A_KEY": "B" }, "keyboardNames": ["kb"] }"#,
            r#"{ "map": { "A": "NOT_A_KEY" }, "keyboardNames": ["kb"] }"#,
            r#"{ "layers": { "NOT_A_KEY": {} }, "keyboardNames": ["kb"] }"#,
            r#"{ "layers": { "CAPSLOCK": { "H": "NOT_A_KEY" } }, "keyboardNames": ["kb"] }"#,
        ] {
            let err = Remapper::new(&Config::parse(config).unwrap()).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{config}");
        }
    }

    #[test]
    fn modifiers_are_ignored_in_the_base_table() {
        let remapper = remapper(LAYER_CONFIG);
        assert_eq!(remapper.table(0)[KEY_CAPSLOCK as usize], IGNORED);
    }

    #[test]
    fn unmentioned_codes_stay_identity_in_every_layer() {
        let remapper = remapper(LAYER_CONFIG);
        for layer in [0, KEY_CAPSLOCK] {
            let table = remapper.table(layer);
            assert_eq!(table.len(), MAX_KEYCODE as usize + 1);
            for code in 0..=MAX_KEYCODE {
                if code == KEY_CAPSLOCK || (layer != 0 && code == KEY_H) {
                    continue;
                }
                assert_eq!(table[code as usize], code, "layer {layer} code {code}");
            }
        }
    }
}
