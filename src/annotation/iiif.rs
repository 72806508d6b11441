use rusqlite::Connection;
use serde_json::{json, Value};

use super::{create, list_for_object, Annotation, NewAnnotation, NewTarget, Target};
use crate::error::{ResearchError, Result};
use crate::types::{Motivation, Visibility};

const ANNO_CONTEXT: &str = "http://www.w3.org/ns/anno.jsonld";
const IIIF_CONTEXT: &str = "http://iiif.io/api/presentation/3/context.json";

fn target_source(target: &Target, base: &str) -> String {
    if let Some(url) = target.source_url.as_deref().filter(|u| !u.is_empty()) {
        return url.to_string();
    }
    match target.source_id {
        Some(id) => format!("{base}/{}/{id}", target.source_type),
        None => format!("{base}/{}", target.source_type),
    }
}

fn w3c_target(target: &Target, base: &str) -> Value {
    let mut out = json!({ "source": target_source(target, base) });
    if let Some(selector) = &target.selector {
        let mut selector = selector.clone();
        if let (Some(kind), Some(map)) = (target.selector_type, selector.as_object_mut()) {
            map.entry("type").or_insert_with(|| json!(kind.as_str()));
        }
        out["selector"] = selector;
    }
    out
}

/// JSON-LD rendition of an annotation. `base` carries no trailing slash.
pub fn to_w3c(annotation: &Annotation, base: &str) -> Value {
    let base = base.trim_end_matches('/');
    let mut out = json!({
        "@context": ANNO_CONTEXT,
        "id": format!("{base}/research/annotations/{}", annotation.id),
        "type": "Annotation",
        "motivation": annotation.motivation.as_str(),
        "body": annotation.body,
        "created": annotation.created_at,
        "modified": annotation.updated_at,
    });
    if let Some(creator) = &annotation.creator {
        out["creator"] = creator.clone();
    }
    if let Some(generated) = &annotation.generated {
        out["generator"] = generated.clone();
    }
    let targets: Vec<Value> = annotation.targets.iter().map(|t| w3c_target(t, base)).collect();
    out["target"] = match targets.len() {
        0 => Value::Null,
        1 => targets.into_iter().next().unwrap_or(Value::Null),
        _ => Value::Array(targets),
    };
    out
}

/// IIIF `AnnotationPage` of the shared and public annotations on an object.
pub fn export_iiif(conn: &Connection, object_id: i64, base: &str) -> Result<Value> {
    let base = base.trim_end_matches('/');
    let items: Vec<Value> = list_for_object(conn, object_id)?
        .iter()
        .filter(|a| a.visibility != Visibility::Private)
        .map(|a| to_w3c(a, base))
        .collect();
    Ok(json!({
        "@context": IIIF_CONTEXT,
        "id": format!("{base}/research/annotations/object/{object_id}"),
        "type": "AnnotationPage",
        "partOf": { "type": "AnnotationCollection", "total": items.len() },
        "items": items,
    }))
}

fn string_or_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("id")
            .or_else(|| map.get("@id"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn import_target(raw: &Value, object_id: i64) -> NewTarget {
    let mut target = NewTarget {
        source_id: Some(object_id),
        ..Default::default()
    };
    match raw {
        Value::String(uri) => match uri.split_once("#xywh=") {
            Some((source, region)) => {
                target.source_url = Some(source.to_string());
                target.selector = Some(json!({
                    "type": "FragmentSelector",
                    "value": format!("xywh={region}"),
                }));
            }
            None => target.source_url = Some(uri.clone()),
        },
        Value::Object(map) => {
            target.source_url = map
                .get("source")
                .or_else(|| map.get("full"))
                .and_then(string_or_id)
                .or_else(|| string_or_id(raw));
            if let Some(selector) = map.get("selector").filter(|s| s.is_object()) {
                let mut selector = selector.clone();
                let kind = selector
                    .get("type")
                    .or_else(|| selector.get("@type"))
                    .and_then(Value::as_str)
                    .map(|t| t.trim_start_matches("oa:").to_string());
                if let (Some(kind), Some(obj)) = (kind, selector.as_object_mut()) {
                    obj.remove("@type");
                    obj.insert("type".into(), json!(kind));
                }
                target.selector = Some(selector);
            }
        }
        _ => {}
    }
    target
}

fn import_body(raw: &Value) -> Option<Value> {
    match raw {
        Value::String(text) => Some(json!({ "type": "TextualBody", "value": text, "format": "text/plain" })),
        Value::Object(map) => {
            let mut body = map.clone();
            if !body.contains_key("value") {
                if let Some(chars) = body.get("chars").cloned() {
                    body.insert("value".into(), chars);
                }
            }
            if let Some(kind) = body.remove("@type") {
                body.entry("type").or_insert(kind);
            }
            Some(Value::Object(body))
        }
        Value::Array(items) => items.first().and_then(import_body),
        _ => None,
    }
}

fn import_motivation(raw: Option<&Value>) -> Motivation {
    let first = match raw {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(Value::Array(items)) => items.iter().find_map(Value::as_str),
        _ => None,
    };
    first.map(Motivation::from_external).unwrap_or(Motivation::Commenting)
}

/// Imports the annotations of a IIIF v3 page (`items`) or v2 list
/// (`resources`) as private annotations on `object_id`.
pub fn import_iiif(conn: &Connection, researcher_id: i64, object_id: i64, page: &Value) -> Result<usize> {
    let entries = page
        .get("items")
        .or_else(|| page.get("resources"))
        .and_then(Value::as_array)
        .ok_or_else(|| ResearchError::invalid("expected an annotation page with items or resources"))?;

    let mut imported = 0;
    for entry in entries {
        let kind = entry
            .get("type")
            .or_else(|| entry.get("@type"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if kind != "Annotation" && kind != "oa:Annotation" {
            continue;
        }
        let Some(body) = entry
            .get("body")
            .or_else(|| entry.get("resource"))
            .and_then(import_body)
        else {
            log::debug!("skipping IIIF annotation without body on object {}", object_id);
            continue;
        };
        let target = entry
            .get("target")
            .or_else(|| entry.get("on"))
            .map(|t| import_target(t, object_id))
            .unwrap_or_else(|| NewTarget {
                source_id: Some(object_id),
                ..Default::default()
            });
        let data = NewAnnotation {
            object_id: Some(object_id),
            motivation: Some(import_motivation(entry.get("motivation")).as_str().to_string()),
            body,
            visibility: Some(Visibility::Private.as_str().to_string()),
            targets: vec![target],
            ..Default::default()
        };
        create(conn, researcher_id, &data)?;
        imported += 1;
    }
    log::info!("📥 Imported {} IIIF annotations for object {}", imported, object_id);
    Ok(imported)
}
