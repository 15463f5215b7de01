use std::{
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

use opentelemetry::{Array, KeyValue, Value as AttrValue, trace::Status};
use opentelemetry_proto::{
    tonic::collector::trace::v1::ExportTraceServiceRequest,
    transform::{
        common::tonic::ResourceAttributesWithSchema,
        trace::tonic::group_spans_by_resource_and_scope,
    },
};
use opentelemetry_sdk::{Resource, trace::SpanData};
use serde_json::{Map, Value, json};

use agl_model::{
    Attributes, ResourceRecord, SpanContextRecord, SpanEventRecord, SpanLinkRecord, SpanRecord,
    SpanStatusRecord, StatusCode,
};

use crate::{pipeline::extend_resource, predicate::is_child, store::Correlation};

const ROLLOUT_ID_ATTR: &str = "agentlightning.rollout_id";
const ATTEMPT_ID_ATTR: &str = "agentlightning.attempt_id";
const SEQUENCE_ID_ATTR: &str = "agentlightning.span_sequence_id";

/// Seconds since the unix epoch; times before it map to 0.
pub fn epoch_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Drop null values and stringify nested objects. Arrays and scalars pass
/// through unchanged.
pub fn sanitize_attributes(attrs: &Map<String, Value>) -> Attributes {
    attrs
        .iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::Object(_) => Some((key.clone(), Value::String(value.to_string()))),
            other => Some((key.clone(), other.clone())),
        })
        .collect()
}

fn json_value(value: &AttrValue) -> Value {
    match value {
        AttrValue::Bool(b) => Value::Bool(*b),
        AttrValue::I64(i) => Value::from(*i),
        AttrValue::F64(f) => Value::from(*f),
        AttrValue::String(s) => Value::String(s.as_str().to_string()),
        AttrValue::Array(array) => match array {
            Array::Bool(items) => items.iter().copied().map(Value::Bool).collect(),
            Array::I64(items) => items.iter().copied().map(Value::from).collect(),
            Array::F64(items) => items.iter().copied().map(Value::from).collect(),
            Array::String(items) => items
                .iter()
                .map(|s| Value::String(s.as_str().to_string()))
                .collect(),
            other => Value::String(other.to_string()),
        },
        other => Value::String(other.as_str().into_owned()),
    }
}

fn attribute_map<'a>(attrs: impl IntoIterator<Item = &'a KeyValue>) -> Map<String, Value> {
    attrs
        .into_iter()
        .map(|kv| (kv.key.as_str().to_string(), json_value(&kv.value)))
        .collect()
}

/// Input of the rollout synthesized for a root span.
///
/// `timestamp` is when the rollout is created, not when the span started.
pub fn rollout_input(span: &SpanData, timestamp: &str) -> Value {
    let attrs = attribute_map(&span.attributes);
    let agent = attrs
        .get("agent.name")
        .or_else(|| attrs.get("mastra.agent.name"))
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or_else(|| Value::String("unknown".into()));

    let attributes: Map<String, Value> = attrs
        .iter()
        .filter(|(k, v)| !k.starts_with('_') && !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    json!({
        "trace_id": span.span_context.trace_id().to_string(),
        "span_name": span.name,
        "agent": agent,
        "timestamp": timestamp,
        "attributes": attributes,
    })
}

fn resource_map(resource: &Resource) -> Map<String, Value> {
    resource
        .iter()
        .map(|(key, value)| (key.as_str().to_string(), json_value(value)))
        .collect()
}

/// W3C `tracestate` entries of the span's context.
fn trace_state(span: &SpanData) -> BTreeMap<String, String> {
    span.span_context
        .trace_state()
        .header()
        .split(',')
        .filter_map(|entry| entry.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

pub fn to_span_record(
    span: &SpanData,
    correlation: &Correlation,
    sequence_id: u64,
    resource: &Resource,
) -> SpanRecord {
    let trace_id = span.span_context.trace_id().to_string();
    let span_id = span.span_context.span_id().to_string();
    let parent_id = is_child(span).then(|| span.parent_span_id.to_string());

    let status = match &span.status {
        Status::Unset => SpanStatusRecord::default(),
        Status::Ok => SpanStatusRecord {
            status_code: StatusCode::Ok,
            description: None,
        },
        Status::Error { description } => SpanStatusRecord {
            status_code: StatusCode::Error,
            description: Some(description.to_string()),
        },
    };

    let mut context = SpanContextRecord::new(&trace_id, &span_id, span.span_context.is_remote());
    context.trace_state = trace_state(span);

    SpanRecord {
        rollout_id: correlation.rollout_id.clone(),
        attempt_id: correlation.attempt_id.clone(),
        sequence_id,
        name: span.name.to_string(),
        status,
        attributes: sanitize_attributes(&attribute_map(&span.attributes)),
        events: span
            .events
            .iter()
            .map(|e| SpanEventRecord {
                name: e.name.to_string(),
                timestamp: epoch_seconds(e.timestamp),
                attributes: sanitize_attributes(&attribute_map(&e.attributes)),
            })
            .collect(),
        links: span
            .links
            .iter()
            .map(|l| SpanLinkRecord {
                trace_id: l.span_context.trace_id().to_string(),
                span_id: l.span_context.span_id().to_string(),
                attributes: sanitize_attributes(&attribute_map(&l.attributes)),
            })
            .collect(),
        start_time: epoch_seconds(span.start_time),
        end_time: epoch_seconds(span.end_time),
        context,
        parent: parent_id
            .as_ref()
            .map(|parent| SpanContextRecord::new(&trace_id, parent, false)),
        resource: ResourceRecord {
            attributes: sanitize_attributes(&resource_map(resource)),
        },
        trace_id,
        span_id,
        parent_id,
    }
}

/// OTLP `ExportTraceServiceRequest` carrying one span.
///
/// Rollout and attempt ids travel as resource attributes, the sequence
/// number as a span attribute.
pub fn to_otlp_request(
    span: &SpanData,
    correlation: &Correlation,
    sequence_id: u64,
    resource: &Resource,
) -> ExportTraceServiceRequest {
    let mut span = span.clone();
    span.attributes.push(KeyValue::new(
        SEQUENCE_ID_ATTR,
        i64::try_from(sequence_id).unwrap_or(i64::MAX),
    ));
    let resource = extend_resource(
        resource,
        [
            KeyValue::new(ROLLOUT_ID_ATTR, correlation.rollout_id.to_string()),
            KeyValue::new(ATTEMPT_ID_ATTR, correlation.attempt_id.to_string()),
        ],
    );

    ExportTraceServiceRequest {
        resource_spans: group_spans_by_resource_and_scope(
            vec![span],
            &ResourceAttributesWithSchema::from(&resource),
        ),
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::{
        Context,
        trace::{Span as _, TraceContextExt, Tracer as _, TracerProvider as _},
    };
    use opentelemetry_proto::tonic::common::v1::{KeyValue as ProtoKeyValue, any_value};
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};

    use super::*;
    use crate::{pipeline::service_resource, testing::trace_of};

    fn correlation() -> Correlation {
        Correlation {
            rollout_id: "ro-1".into(),
            attempt_id: "at-1".into(),
        }
    }

    fn proto_attr(attrs: &[ProtoKeyValue], key: &str) -> Option<any_value::Value> {
        attrs
            .iter()
            .find(|kv| kv.key == key)
            .and_then(|kv| kv.value.clone())
            .and_then(|v| v.value)
    }

    #[test]
    fn sanitize_drops_nulls_and_stringifies_objects() {
        let mut attrs = Map::new();
        attrs.insert("a".into(), json!(null));
        attrs.insert("b".into(), json!({"x": 1}));
        attrs.insert("c".into(), json!([1, {"y": 2}]));
        attrs.insert("d".into(), json!("text"));
        attrs.insert("e".into(), json!(3.5));

        let clean = sanitize_attributes(&attrs);
        assert!(!clean.contains_key("a"));
        assert_eq!(clean["b"], json!(r#"{"x":1}"#));
        assert_eq!(clean["c"], json!([1, {"y": 2}]));
        assert_eq!(clean["d"], json!("text"));
        assert_eq!(clean["e"], json!(3.5));
    }

    #[test]
    fn attribute_values_map_to_json() {
        let attrs = [
            KeyValue::new("ok", true),
            KeyValue::new("tokens", 42_i64),
            KeyValue::new("score", 0.5),
            KeyValue::new("model", "small"),
            KeyValue::new("tags", AttrValue::Array(Array::String(vec!["a".into(), "b".into()]))),
        ];
        let map = attribute_map(&attrs);
        assert_eq!(map["ok"], json!(true));
        assert_eq!(map["tokens"], json!(42));
        assert_eq!(map["score"], json!(0.5));
        assert_eq!(map["model"], json!("small"));
        assert_eq!(map["tags"], json!(["a", "b"]));
    }

    #[test]
    fn rollout_input_describes_the_root_span() {
        let spans = trace_of(
            "agent.generate",
            vec![
                KeyValue::new("mastra.agent.name", "post-analyzer"),
                KeyValue::new("_internal", "hidden"),
                KeyValue::new("model", "gpt"),
            ],
            &[],
        );

        let input = rollout_input(&spans[0], "2026-01-01T00:00:00Z");
        assert_eq!(
            input,
            json!({
                "trace_id": spans[0].span_context.trace_id().to_string(),
                "span_name": "agent.generate",
                "agent": "post-analyzer",
                "timestamp": "2026-01-01T00:00:00Z",
                "attributes": {"mastra.agent.name": "post-analyzer", "model": "gpt"}
            })
        );
    }

    #[test]
    fn rollout_input_prefers_agent_name_and_defaults_to_unknown() {
        let both = trace_of(
            "x",
            vec![
                KeyValue::new("agent.name", "a"),
                KeyValue::new("mastra.agent.name", "b"),
            ],
            &[],
        );
        assert_eq!(rollout_input(&both[0], "now")["agent"], json!("a"));

        let none = trace_of("x", vec![], &[]);
        assert_eq!(rollout_input(&none[0], "now")["agent"], json!("unknown"));
    }

    #[test]
    fn record_carries_ids_parent_status_and_events() {
        let memory = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(memory.clone())
            .build();
        let tracer = provider.tracer("test");

        let cx = Context::current_with_span(tracer.start("agent.generate"));
        let mut llm = tracer.start_with_context("llm.chat", &cx);
        llm.add_event("retry", vec![KeyValue::new("attempt", 2_i64)]);
        llm.set_status(Status::error("rate limited"));
        llm.end();
        cx.span().end();

        let spans = memory.get_finished_spans().unwrap();
        let (llm, root) = (&spans[0], &spans[1]);
        let record = to_span_record(llm, &correlation(), 4, &service_resource("svc"));

        let root_id = root.span_context.span_id().to_string();
        let trace_id = root.span_context.trace_id().to_string();
        assert_eq!(record.sequence_id, 4);
        assert_eq!(record.rollout_id.as_str(), "ro-1");
        assert_eq!(record.trace_id, trace_id);
        assert_eq!(record.span_id.len(), 16);
        assert_eq!(record.parent_id.as_deref(), Some(root_id.as_str()));
        let parent = record.parent.as_ref().unwrap();
        assert_eq!(parent.span_id, root_id);
        assert_eq!(parent.trace_id, trace_id);
        assert_eq!(record.context.span_id, record.span_id);
        assert!(!record.context.is_remote);
        assert!(record.start_time > 0.0 && record.start_time <= record.end_time);

        assert_eq!(record.status.status_code, StatusCode::Error);
        assert_eq!(record.status.description.as_deref(), Some("rate limited"));
        assert_eq!(record.events.len(), 1);
        assert_eq!(record.events[0].name, "retry");
        assert_eq!(record.events[0].attributes["attempt"], json!(2));
        assert_eq!(record.resource.attributes["service.name"], json!("svc"));

        let root_record = to_span_record(root, &correlation(), 0, &service_resource("svc"));
        assert_eq!(root_record.parent_id, None);
        assert!(root_record.parent.is_none());
        assert_eq!(root_record.status.status_code, StatusCode::Unset);
    }

    #[test]
    fn otlp_request_tags_resource_and_sequence() {
        let spans = trace_of("agent.generate", vec![], &["llm.chat"]);
        let request = to_otlp_request(&spans[1], &correlation(), 7, &service_resource("svc"));

        assert_eq!(request.resource_spans.len(), 1);
        let rs = &request.resource_spans[0];
        let resource = &rs.resource.as_ref().unwrap().attributes;
        assert_eq!(
            proto_attr(resource, "agentlightning.rollout_id"),
            Some(any_value::Value::StringValue("ro-1".into()))
        );
        assert_eq!(
            proto_attr(resource, "agentlightning.attempt_id"),
            Some(any_value::Value::StringValue("at-1".into()))
        );
        assert_eq!(
            proto_attr(resource, "service.name"),
            Some(any_value::Value::StringValue("svc".into()))
        );

        let span = &rs.scope_spans[0].spans[0];
        assert_eq!(span.name, "llm.chat");
        assert_eq!(
            span.parent_span_id,
            spans[0].span_context.span_id().to_bytes().to_vec()
        );
        assert_eq!(
            proto_attr(&span.attributes, "agentlightning.span_sequence_id"),
            Some(any_value::Value::IntValue(7))
        );
    }
}
