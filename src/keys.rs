//! Key-name table for the kernel keycode range the remapper operates on.
//!
//! Names are the kernel `KEY_*` identifiers without the prefix, which is
//! also the vocabulary of the configuration file. Code 0 (`RESERVED`) is the
//! IGNORED sentinel: an event translated to it is dropped.

/// Upper bound of the keycode range covered by the table (`MICMUTE`).
pub const MAX_KEYCODE: u16 = 248;

/// Translating a key to this code drops the event.
pub const IGNORED: u16 = 0;

/// Dense name table indexed by keycode. Gaps hold `"?"`.
static KEY_NAMES: [&str; MAX_KEYCODE as usize + 1] = [
    "RESERVED", "ESC", "1", "2", "3", "4", "5", "6", // 0
    "7", "8", "9", "0", "MINUS", "EQUAL", "BACKSPACE", "TAB", // 8
    "Q", "W", "E", "R", "T", "Y", "U", "I", // 16
    "O", "P", "LEFTBRACE", "RIGHTBRACE", "ENTER", "LEFTCTRL", "A", "S", // 24
    "D", "F", "G", "H", "J", "K", "L", "SEMICOLON", // 32
    "APOSTROPHE", "GRAVE", "LEFTSHIFT", "BACKSLASH", "Z", "X", "C", "V", // 40
    "B", "N", "M", "COMMA", "DOT", "SLASH", "RIGHTSHIFT", "KPASTERISK", // 48
    "LEFTALT", "SPACE", "CAPSLOCK", "F1", "F2", "F3", "F4", "F5", // 56
    "F6", "F7", "F8", "F9", "F10", "NUMLOCK", "SCROLLLOCK", "KP7", // 64
    "KP8", "KP9", "KPMINUS", "KP4", "KP5", "KP6", "KPPLUS", "KP1", // 72
    "KP2", "KP3", "KP0", "KPDOT", "?", "ZENKAKUHANKAKU", "102ND", "F11", // 80
    "F12", "RO", "KATAKANA", "HIRAGANA", "HENKAN", "KATAKANAHIRAGANA", "MUHENKAN",
    "KPJPCOMMA", // 88
    "KPENTER", "RIGHTCTRL", "KPSLASH", "SYSRQ", "RIGHTALT", "LINEFEED", "HOME", "UP", // 96
    "PAGEUP", "LEFT", "RIGHT", "END", "DOWN", "PAGEDOWN", "INSERT", "DELETE", // 104
    "MACRO", "MUTE", "VOLUMEDOWN", "VOLUMEUP", "POWER", "KPEQUAL", "KPPLUSMINUS",
    "PAUSE", // 112
    "SCALE", "KPCOMMA", "HANGEUL", "HANJA", "YEN", "LEFTMETA", "RIGHTMETA", "COMPOSE", // 120
    "STOP", "AGAIN", "PROPS", "UNDO", "FRONT", "COPY", "OPEN", "PASTE", // 128
    "FIND", "CUT", "HELP", "MENU", "CALC", "SETUP", "SLEEP", "WAKEUP", // 136
    "FILE", "SENDFILE", "DELETEFILE", "XFER", "PROG1", "PROG2", "WWW", "MSDOS", // 144
    "COFFEE", "ROTATE_DISPLAY", "CYCLEWINDOWS", "MAIL", "BOOKMARKS", "COMPUTER", "BACK",
    "FORWARD", // 152
    "CLOSECD", "EJECTCD", "EJECTCLOSECD", "NEXTSONG", "PLAYPAUSE", "PREVIOUSSONG", "STOPCD",
    "RECORD", // 160
    "REWIND", "PHONE", "ISO", "CONFIG", "HOMEPAGE", "REFRESH", "EXIT", "MOVE", // 168
    "EDIT", "SCROLLUP", "SCROLLDOWN", "KPLEFTPAREN", "KPRIGHTPAREN", "NEW", "REDO",
    "F13", // 176
    "F14", "F15", "F16", "F17", "F18", "F19", "F20", "F21", // 184
    "F22", "F23", "F24", "?", "?", "?", "?", "?", // 192
    "PLAYCD", "PAUSECD", "PROG3", "PROG4", "DASHBOARD", "SUSPEND", "CLOSE", "PLAY", // 200
    "FASTFORWARD", "BASSBOOST", "PRINT", "HP", "CAMERA", "SOUND", "QUESTION", "EMAIL", // 208
    "CHAT", "SEARCH", "CONNECT", "FINANCE", "SPORT", "SHOP", "ALTERASE", "CANCEL", // 216
    "BRIGHTNESSDOWN", "BRIGHTNESSUP", "MEDIA", "SWITCHVIDEOMODE", "KBDILLUMTOGGLE",
    "KBDILLUMDOWN", "KBDILLUMUP", "SEND", // 224
    "REPLY", "FORWARDMAIL", "SAVE", "DOCUMENTS", "BATTERY", "BLUETOOTH", "WLAN", "UWB", // 232
    "UNKNOWN", "VIDEO_NEXT", "VIDEO_PREV", "BRIGHTNESS_CYCLE", "BRIGHTNESS_AUTO",
    "DISPLAY_OFF", "WWAN", "RFKILL", // 240
    "MICMUTE", // 248
];

/// Name for a keycode, `"?"` when the code is unknown or out of range.
pub fn name_of(code: u16) -> &'static str {
    KEY_NAMES.get(code as usize).copied().unwrap_or("?")
}

/// Keycode for a name, `None` when the name is unknown.
pub fn code_of(name: &str) -> Option<u16> {
    KEY_NAMES
        .iter()
        .position(|&n| n != "?" && n == name)
        .map(|i| i as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        for code in 0..=MAX_KEYCODE {
            let name = name_of(code);
            if name != "?" {
                assert_eq!(code_of(name), Some(code), "{name}");
            }
        }
    }

    #[test]
    fn well_known_codes() {
        assert_eq!(code_of("RESERVED"), Some(0));
        assert_eq!(code_of("A"), Some(30));
        assert_eq!(code_of("H"), Some(35));
        assert_eq!(code_of("CAPSLOCK"), Some(58));
        assert_eq!(code_of("LEFT"), Some(105));
        assert_eq!(code_of("MICMUTE"), Some(MAX_KEYCODE));
    }

    #[test]
    fn gaps_and_unknowns() {
        assert_eq!(name_of(84), "?");
        assert_eq!(name_of(195), "?");
        assert_eq!(name_of(MAX_KEYCODE + 1), "?");
        assert_eq!(code_of("?"), None);
        assert_eq!(code_of("NO_SUCH_KEY"), None);
        assert_eq!(code_of("a"), None);
    }
}
