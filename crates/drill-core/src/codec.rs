//! Callback token codec.
//!
//! Every inline button carries `(owner flow, step, payload)` encoded as
//! `"{owner}.{step}.{payload}"`, where owner and step are the stable numeric
//! codes below. The payload is everything after the second dot and may itself
//! contain dots. Telegram caps callback data at 64 bytes.

use std::fmt;
use std::str::FromStr;

use crate::{errors::Error, Result};

/// Telegram's limit for `callback_data`.
pub const MAX_TOKEN_LEN: usize = 64;

macro_rules! coded_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $code:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub fn code(self) -> u8 {
                match self {
                    $($name::$variant => $code,)+
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = u8;

            fn try_from(code: u8) -> std::result::Result<Self, u8> {
                match code {
                    $($code => Ok($name::$variant),)+
                    other => Err(other),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }
    };
}

coded_enum! {
    /// Flow that owns a button or a session.
    FlowId {
        Ignore = 0,
        Command = 1,
        MainMenu = 2,
        Debt = 3,
        Date = 4,
    }
}

coded_enum! {
    /// Step within a flow. Codes are stable; never renumber.
    StepId {
        Ignore = 0,
        Start = 1,
        Help = 2,
        Manual = 3,
        List = 4,
        AddStart = 5,
        AddDescription = 6,
        AddAmount = 7,
        AddFinish = 8,
        Select = 9,
        EditStart = 10,
        EditMenu = 11,
        EnterDescription = 12,
        EditDescription = 13,
        EnterAmount = 14,
        EditAmount = 15,
        EnterDate = 16,
        EditDate = 17,
        EditFinish = 18,
        DeleteStart = 19,
        DeleteConfirm = 20,
        DeleteFinish = 21,
        PayStart = 22,
        EnterPayment = 23,
        PayAmount = 24,
        PayFinish = 25,
        Year = 26,
        Month = 27,
        Day = 28,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallbackToken {
    pub owner: FlowId,
    pub step: StepId,
    pub payload: String,
}

impl CallbackToken {
    pub fn new(owner: FlowId, step: StepId, payload: impl Into<String>) -> Self {
        Self {
            owner,
            step,
            payload: payload.into(),
        }
    }

    /// Token for decorative cells (calendar padding, headers).
    pub fn ignore() -> Self {
        Self::new(FlowId::Ignore, StepId::Ignore, "")
    }

    pub fn is_ignore(&self) -> bool {
        self.owner == FlowId::Ignore
    }

    pub fn encode(&self) -> Result<String> {
        let out = self.to_string();
        if out.len() > MAX_TOKEN_LEN {
            return Err(Error::TokenTooLong(out.len()));
        }
        Ok(out)
    }

    pub fn decode(raw: &str) -> Result<Self> {
        raw.parse()
    }
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.owner.code(), self.step.code(), self.payload)
    }
}

impl FromStr for CallbackToken {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let malformed = || Error::MalformedToken(raw.to_string());

        if raw.len() > MAX_TOKEN_LEN {
            return Err(malformed());
        }

        let mut parts = raw.splitn(3, '.');
        let (Some(owner), Some(step), Some(payload)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let owner = parse_code(owner)
            .and_then(|c| FlowId::try_from(c).ok())
            .ok_or_else(malformed)?;
        let step = parse_code(step)
            .and_then(|c| StepId::try_from(c).ok())
            .ok_or_else(malformed)?;

        Ok(Self::new(owner, step, payload))
    }
}

/// Canonical decimal only: no sign, whitespace or leading zeros.
fn parse_code(s: &str) -> Option<u8> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}
