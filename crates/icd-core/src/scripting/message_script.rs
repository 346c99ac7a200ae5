//! Console access to messages: every [`Message`] is a [`Scriptable`] object.

use crate::protocol::error::IcdError;
use crate::protocol::message::Message;
use crate::scripting::{CommandResult, Param, ScriptError, Scriptable};

const MESSAGE_COMMANDS: &[&str] = &["serialize", "parse", "frame", "sequence", "fields", "get", "set"];

impl Scriptable for Message {
    fn name(&self) -> &str {
        Message::name(self)
    }

    fn get(&self, item: &str) -> Result<f64, ScriptError> {
        Message::get(self, item).map_err(|e| into_script_error(item, e))
    }

    fn set(&mut self, item: &str, value: f64) -> Result<(), ScriptError> {
        Message::set(self, item, value).map_err(|e| into_script_error(item, e))
    }

    fn exec(&mut self, command: &str, params: &[Param]) -> CommandResult {
        match command {
            "serialize" => match self.serialize() {
                Ok(frame) => CommandResult::ok(format!(
                    "{} bytes: {}",
                    frame.len(),
                    to_hex(&frame)
                ))
                .with_value(frame),
                Err(e) => CommandResult::error(format!("serialize failed: {e}")),
            },
            "parse" => match from_hex(params) {
                Ok(bytes) => match self.parse(&bytes, 0) {
                    Ok(n) => CommandResult::ok(format!("parsed {n} payload bytes")),
                    Err(e) => CommandResult::error(format!("parse failed: {e}")),
                },
                Err(msg) => CommandResult::error(msg),
            },
            "frame" => match from_hex(params) {
                Ok(bytes) => match self.parse_frame(&bytes) {
                    Ok(n) => CommandResult::ok(format!("parsed {n} byte frame")),
                    Err(e) => CommandResult::error(format!("frame rejected: {e}")),
                },
                Err(msg) => CommandResult::error(msg),
            },
            "sequence" => CommandResult::info("next sequence").with_value(self.next_sequence()),
            "fields" => {
                let listing: Vec<String> = self
                    .fields()
                    .map(|(name, f)| format!("{name}={} ({})", f.value(), f.kind()))
                    .collect();
                CommandResult::info(listing.join(", "))
            }
            "get" => match params {
                [item] => match Scriptable::get(self, item.as_str()) {
                    Ok(v) => CommandResult::ok(item.as_str()).with_value(v),
                    Err(e) => CommandResult::error(e.to_string()),
                },
                _ => CommandResult::error("usage: get <item>"),
            },
            "set" => match params {
                [item, value] => match value.as_f64() {
                    Some(v) => match Scriptable::set(self, item.as_str(), v) {
                        Ok(()) => CommandResult::ok(format!("{} set", item.as_str()))
                            .with_value(Message::get(self, item.as_str()).unwrap_or(v)),
                        Err(e) => CommandResult::error(e.to_string()),
                    },
                    None => CommandResult::error(format!("'{}' is not a number", value.as_str())),
                },
                _ => CommandResult::error("usage: set <item> <value>"),
            },
            other => CommandResult::error(format!(
                "unknown command '{other}' for {}",
                Message::name(self)
            )),
        }
    }

    fn items(&self) -> Vec<String> {
        self.item_names()
    }

    fn commands(&self) -> Vec<&'static str> {
        MESSAGE_COMMANDS.to_vec()
    }
}

fn into_script_error(item: &str, err: IcdError) -> ScriptError {
    match err {
        IcdError::UnknownField(_) | IcdError::UnknownSubfield(_) => {
            ScriptError::UnknownItem(item.to_string())
        }
        other => ScriptError::Icd(other),
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Joins all parameters and decodes them as hex, so both `AA0102` and
/// `AA 01 02` are accepted.
fn from_hex(params: &[Param]) -> Result<Vec<u8>, String> {
    let digits: String = params.iter().map(Param::as_str).collect();
    if digits.is_empty() {
        return Err("expected hex bytes".to_string());
    }
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in '{digits}'"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("invalid hex byte at position {i} in '{digits}'"))
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::bit_field::BitField;
    use crate::protocol::field::Field;
    use crate::scripting::CommandStatus;

    fn message() -> Message {
        let flags = BitField::new(8)
            .and_then(|f| f.with_subfield("on", 0, 1))
            .and_then(|f| f.with_subfield("mode", 1, 2))
            .unwrap();
        Message::new("probe", 0x05, 11)
            .with_field("value", Field::float(0.0))
            .and_then(|m| m.with_field("flags", Field::bits(flags)))
            .unwrap()
    }

    fn params(raw: &[&str]) -> Vec<Param> {
        raw.iter().map(|s| Param::from(*s)).collect()
    }

    #[test]
    fn test_scriptable_name_is_message_name() {
        let msg = message();
        assert_eq!(Scriptable::name(&msg), "probe");
    }

    #[test]
    fn test_get_unknown_item_maps_to_unknown_item() {
        let msg = message();
        assert_eq!(
            Scriptable::get(&msg, "flags.bogus"),
            Err(ScriptError::UnknownItem("flags.bogus".to_string()))
        );
    }

    #[test]
    fn test_set_out_of_range_keeps_codec_error() {
        let mut msg = message();
        let err = Scriptable::set(&mut msg, "flags.mode", 4.0).unwrap_err();
        assert!(matches!(err, ScriptError::Icd(IcdError::ValueOutOfRange { .. })));
    }

    #[test]
    fn test_exec_serialize_returns_frame_bytes() {
        let mut msg = message();
        msg.set("flags.mode", 3.0).unwrap();

        let result = msg.exec("serialize", &[]);

        assert_eq!(result.status, CommandStatus::Ok);
        assert!(result.message.starts_with("15 bytes: AA 05 00 0B"));
        let bytes = result.value.unwrap();
        assert_eq!(bytes[12], serde_json::json!(0b110));
    }

    #[test]
    fn test_exec_parse_accepts_split_hex() {
        let mut msg = message();
        let result = msg.exec("parse", &params(&["3FF0000000000000", "07"]));
        assert_eq!(result.status, CommandStatus::Ok, "{result}");
        assert_eq!(msg.get("value").unwrap(), 1.0);
        assert_eq!(msg.get("flags.mode").unwrap(), 3.0);
    }

    #[test]
    fn test_exec_parse_rejects_bad_hex() {
        let mut msg = message();
        assert!(msg.exec("parse", &params(&["ZZ"])).is_error());
        assert!(msg.exec("parse", &params(&["ABC"])).is_error());
        assert!(msg.exec("parse", &[]).is_error());
    }

    #[test]
    fn test_exec_frame_round_trips_serialized_output() {
        let mut source = message();
        source.set("value", 9.5).unwrap();
        let frame = source.serialize().unwrap();
        let hex: String = frame.iter().map(|b| format!("{b:02x}")).collect();

        let mut target = message();
        let result = target.exec("frame", &params(&[hex.as_str()]));

        assert_eq!(result.status, CommandStatus::Ok, "{result}");
        assert_eq!(target.get("value").unwrap(), 9.5);
    }

    #[test]
    fn test_exec_get_and_set() {
        let mut msg = message();
        let set = msg.exec("set", &params(&["flags.on", "1"]));
        assert_eq!(set.status, CommandStatus::Ok);
        let get = msg.exec("get", &params(&["flags"]));
        assert_eq!(get.value, Some(serde_json::json!(1.0)));
        assert!(msg.exec("set", &params(&["flags.on", "yes"])).is_error());
        assert!(msg.exec("get", &[]).is_error());
    }

    #[test]
    fn test_exec_unknown_command_is_error_result() {
        let mut msg = message();
        let result = msg.exec("launch", &[]);
        assert!(result.is_error());
        assert!(result.message.contains("launch"));
    }

    #[test]
    fn test_exec_sequence_reports_next_value() {
        let mut msg = message();
        msg.serialize().unwrap();
        let result = msg.exec("sequence", &[]);
        assert_eq!(result.status, CommandStatus::Info);
        assert_eq!(result.value, Some(serde_json::json!(1)));
    }

    #[test]
    fn test_items_and_commands_are_listed() {
        let msg = message();
        assert_eq!(msg.items(), vec!["value", "flags", "flags.on", "flags.mode"]);
        assert!(msg.commands().contains(&"serialize"));
    }
}
