//! BPMN diagram bookkeeping.
//!
//! The orchestrator never builds or validates BPMN itself — diagrams come
//! from the completion service. The one structural operation it needs is a
//! scan of `id`/`name` attribute pairs, used to replace node-id keys with
//! human-readable names in optimization responses.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ServiceError;

/// Scan an XML document for elements carrying both `id` and `name`
/// attributes and return the `id -> name` map.
///
/// Tolerates a default namespace declaration (stripped up front) and returns
/// `Err` on malformed XML instead of panicking.
pub fn scan_id_name_pairs(xml: &str) -> Result<HashMap<String, String>, ServiceError> {
    // Default-namespace declarations confuse downstream consumers of the
    // pair map; drop them before parsing.
    let stripped = strip_default_namespace(xml);

    let mut reader = Reader::from_str(&stripped);
    let mut pairs = HashMap::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let mut id = None;
                let mut name = None;
                for attr in e.attributes() {
                    let attr = attr.map_err(|e| {
                        ServiceError::BadRequest(format!("Invalid BPMN XML attribute: {}", e))
                    })?;
                    let value = attr.unescape_value().map_err(|e| {
                        ServiceError::BadRequest(format!("Invalid BPMN XML attribute: {}", e))
                    })?;
                    match attr.key.as_ref() {
                        b"id" => id = Some(value.into_owned()),
                        b"name" => name = Some(value.into_owned()),
                        _ => {}
                    }
                }
                if let (Some(id), Some(name)) = (id, name) {
                    pairs.insert(id, name);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ServiceError::BadRequest(format!("Invalid BPMN XML: {}", e)));
            }
        }
    }

    Ok(pairs)
}

fn strip_default_namespace(xml: &str) -> String {
    let re = regex::Regex::new(r#"\s+xmlns="[^"]*""#).unwrap();
    re.replace_all(xml, "").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL" xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
  <bpmn:process id="Process_1" name="Order Handling">
    <bpmn:startEvent id="StartEvent_1" name="Start" />
    <bpmn:task id="Task_1" name="Validate Order" />
    <bpmn:endEvent id="EndEvent_1" name="End" />
  </bpmn:process>
</bpmn:definitions>"#;

    #[test]
    fn test_scans_id_name_pairs() {
        let pairs = scan_id_name_pairs(SAMPLE).unwrap();
        assert_eq!(pairs.get("Task_1").unwrap(), "Validate Order");
        assert_eq!(pairs.get("StartEvent_1").unwrap(), "Start");
        assert_eq!(pairs.get("Process_1").unwrap(), "Order Handling");
    }

    #[test]
    fn test_elements_without_name_are_skipped() {
        let pairs =
            scan_id_name_pairs(r#"<p><flow id="Flow_1"/><task id="T" name="N"/></p>"#).unwrap();
        assert!(!pairs.contains_key("Flow_1"));
        assert_eq!(pairs.get("T").unwrap(), "N");
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        assert!(scan_id_name_pairs("<bpmn:process><unclosed").is_err());
    }
}
