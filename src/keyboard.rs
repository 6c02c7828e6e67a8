use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Finger {
    LeftPinky,
    LeftRing,
    LeftMiddle,
    LeftIndex,
    Thumb,
    RightIndex,
    RightMiddle,
    RightRing,
    RightPinky,
}

/// Touch-typing finger for a character on a US QWERTY layout
pub fn finger_for(c: char) -> Option<Finger> {
    use Finger::*;
    let finger = match c.to_ascii_lowercase() {
        '`' | '~' | '1' | '!' | 'q' | 'a' | 'z' | '\t' => LeftPinky,
        '2' | '@' | 'w' | 's' | 'x' => LeftRing,
        '3' | '#' | 'e' | 'd' | 'c' => LeftMiddle,
        '4' | '$' | '5' | '%' | 'r' | 't' | 'f' | 'g' | 'v' | 'b' => LeftIndex,
        ' ' => Thumb,
        '6' | '^' | '7' | '&' | 'y' | 'u' | 'h' | 'j' | 'n' | 'm' => RightIndex,
        '8' | '*' | 'i' | 'k' | ',' | '<' => RightMiddle,
        '9' | '(' | 'o' | 'l' | '.' | '>' => RightRing,
        '0' | ')' | '-' | '_' | '=' | '+' | 'p' | '[' | '{' | ']' | '}' | '\\' | '|' | ';'
        | ':' | '\'' | '"' | '/' | '?' | '\n' => RightPinky,
        _ => return None,
    };
    Some(finger)
}

/// Keystrokes per finger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerUsage {
    pub left_pinky: u32,
    pub left_ring: u32,
    pub left_middle: u32,
    pub left_index: u32,
    pub thumb: u32,
    pub right_index: u32,
    pub right_middle: u32,
    pub right_ring: u32,
    pub right_pinky: u32,
}

impl FingerUsage {
    pub fn record(&mut self, finger: Finger) {
        *self.slot(finger) += 1;
    }

    pub fn get(&self, finger: Finger) -> u32 {
        let mut copy = *self;
        *copy.slot(finger)
    }

    pub fn total(&self) -> u32 {
        self.left_pinky
            + self.left_ring
            + self.left_middle
            + self.left_index
            + self.thumb
            + self.right_index
            + self.right_middle
            + self.right_ring
            + self.right_pinky
    }

    fn slot(&mut self, finger: Finger) -> &mut u32 {
        match finger {
            Finger::LeftPinky => &mut self.left_pinky,
            Finger::LeftRing => &mut self.left_ring,
            Finger::LeftMiddle => &mut self.left_middle,
            Finger::LeftIndex => &mut self.left_index,
            Finger::Thumb => &mut self.thumb,
            Finger::RightIndex => &mut self.right_index,
            Finger::RightMiddle => &mut self.right_middle,
            Finger::RightRing => &mut self.right_ring,
            Finger::RightPinky => &mut self.right_pinky,
        }
    }
}
