//! Turns a raw completion into a [`NormalizedTurnResponse`]. The completion
//! service is expected, but never guaranteed, to return a JSON payload; this
//! module absorbs every malformation and always produces a usable response.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::models::session::BookingStep;
use crate::models::turn::{ExtractedFields, NormalizedTurnResponse};
use crate::services::extractors::extract_plate;

static FENCED_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap());

static BARE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:"#).unwrap());

static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());

pub fn normalize(raw: &str) -> NormalizedTurnResponse {
    let Some(candidate) = json_candidate(raw) else {
        return fallback(raw);
    };

    let parsed = serde_json::from_str::<Value>(&candidate)
        .ok()
        .or_else(|| serde_json::from_str::<Value>(&repair(&candidate)).ok());

    match parsed {
        Some(Value::Object(map)) => {
            let message = match coerce_string(map.get("message")) {
                Some(m) if !m.trim().is_empty() => m,
                // A payload without a usable message is as good as no payload.
                _ => return fallback(raw),
            };

            let proposed_step = map.get("currentStep").and_then(clamp_step);

            let extracted = map
                .get("extractedData")
                .and_then(Value::as_object)
                .map(|data| ExtractedFields {
                    license_plate: coerce_string(data.get("licensePlate"))
                        .as_deref()
                        .and_then(extract_plate),
                    vehicle_validated: coerce_bool(data.get("vehicleValidated")),
                    service_id: coerce_string(data.get("serviceId")),
                    service_name: coerce_string(data.get("serviceName")),
                    service_validated: coerce_bool(data.get("serviceValidated")),
                    garage_id: coerce_string(data.get("garageId")),
                    garage_name: coerce_string(data.get("garageName")),
                    garage_validated: coerce_bool(data.get("garageValidated")),
                    slot_date: coerce_string(data.get("slotDate")),
                    slot_time: coerce_string(data.get("slotTime")),
                    final_confirmed: coerce_bool(data.get("finalConfirmed")),
                })
                .unwrap_or_default();

            NormalizedTurnResponse {
                message,
                proposed_step,
                extracted,
            }
        }
        _ => fallback(raw),
    }
}

/// Locates the most likely JSON payload: a fenced code block first, then the
/// first balanced `{...}` span, then nothing.
fn json_candidate(raw: &str) -> Option<String> {
    if let Some(caps) = FENCED_BLOCK_RE.captures(raw) {
        let inner = caps[1].trim();
        if !inner.is_empty() {
            return Some(inner.to_string());
        }
    }
    balanced_object_span(raw).map(|s| s.to_string())
}

/// First `{...}` span with balanced braces, ignoring braces inside string
/// literals.
fn balanced_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Bounded textual repairs for the malformations models actually produce:
/// unquoted keys, trailing commas, raw newlines inside string values.
fn repair(candidate: &str) -> String {
    let quoted = BARE_KEY_RE.replace_all(candidate, r#"$1"$2":"#);
    let no_trailing = TRAILING_COMMA_RE.replace_all(&quoted, "$1");
    escape_newlines_in_strings(&no_trailing)
}

fn escape_newlines_in_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => {
                    escaped = false;
                    out.push(c);
                }
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }
    out
}

/// Total fallback: the raw text (fence markers stripped) becomes the message
/// and a best-effort plate scan is the only populated field.
fn fallback(raw: &str) -> NormalizedTurnResponse {
    let message = raw.replace("```json", "").replace("```", "");
    let message = message.trim();
    let message = if message.is_empty() {
        "Je n'ai pas compris votre demande. Pouvez-vous reformuler ?".to_string()
    } else {
        message.to_string()
    };

    NormalizedTurnResponse {
        extracted: ExtractedFields {
            license_plate: extract_plate(&message),
            ..ExtractedFields::default()
        },
        proposed_step: None,
        message,
    }
}

fn clamp_step(value: &Value) -> Option<BookingStep> {
    let n = value.as_u64()?;
    u8::try_from(n).ok().and_then(BookingStep::from_index)
}

fn coerce_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
