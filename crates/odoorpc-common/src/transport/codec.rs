use crate::protocol::error::{Result, RpcError};
use crate::protocol::{RequestEnvelope, Response, Struct, Value};
use roxmltree::{Document, Node};

/// A decoded `<methodCall>` document.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method_name: String,
    pub params: Vec<Value>,
}

/// XML-RPC codec for encoding/decoding call and response documents
///
/// Encoding is infallible string building. Decoding goes through `roxmltree`;
/// only malformed XML or a document that is not XML-RPC at all raises, while
/// unrecognized-but-well-formed value shapes come back as [`Value::Opaque`].
///
/// # Example
///
/// ```
/// use odoorpc_common::transport::XmlRpcCodec;
/// use odoorpc_common::protocol::Value;
///
/// let markup = XmlRpcCodec::encode_value(&Value::from(vec![1, 2]));
/// assert_eq!(markup, "<array><data><value><int>1</int></value><value><int>2</int></value></data></array>");
///
/// let decoded = XmlRpcCodec::decode_value(&markup).unwrap();
/// assert_eq!(decoded, Value::from(vec![1, 2]));
/// ```
pub struct XmlRpcCodec;

impl XmlRpcCodec {
    /// Encode a value into its type element (the content of a `<value>`)
    ///
    /// Doubles with no fractional part are written as `<int>`; the integer
    /// versus double distinction follows the number's shape, not its variant.
    pub fn encode_value(value: &Value) -> String {
        let mut out = String::new();
        write_value(value, &mut out);
        out
    }

    /// Encode a request envelope into a full `<methodCall>` document
    ///
    /// # Arguments
    ///
    /// * `request` - The envelope to encode
    ///
    /// # Returns
    ///
    /// The request body as UTF-8 bytes
    pub fn encode_request(request: &RequestEnvelope) -> Vec<u8> {
        let mut out = String::from("<?xml version=\"1.0\"?>\n<methodCall><methodName>");
        escape_into(&request.method_name(), &mut out);
        out.push_str("</methodName><params>");
        for arg in request.args() {
            out.push_str("<param><value>");
            write_value(arg, &mut out);
            out.push_str("</value></param>");
        }
        out.push_str("</params></methodCall>");
        out.into_bytes()
    }

    /// Encode a response into a full `<methodResponse>` document
    ///
    /// A success payload is always written as a single `<param>`.
    pub fn encode_response(response: &Response) -> Vec<u8> {
        let mut out = String::from("<?xml version=\"1.0\"?>\n<methodResponse>");
        match response {
            Response::Success(payload) => {
                out.push_str("<params><param><value>");
                write_value(payload, &mut out);
                out.push_str("</value></param></params>");
            }
            Response::Fault { code, message } => {
                let mut fault = Struct::new();
                fault.insert("faultCode".to_string(), Value::Int(*code));
                fault.insert("faultString".to_string(), Value::String(message.clone()));
                out.push_str("<fault><value>");
                write_value(&Value::Struct(fault), &mut out);
                out.push_str("</value></fault>");
            }
        }
        out.push_str("</methodResponse>");
        out.into_bytes()
    }

    /// Decode a single value from markup
    ///
    /// Accepts either a `<value>` element or a bare type element such as
    /// `<int>5</int>`.
    pub fn decode_value(markup: &str) -> Result<Value> {
        let doc = parse_document(markup)?;
        let root = doc.root_element();
        if root.has_tag_name("value") {
            Ok(decode_value_node(root))
        } else {
            Ok(decode_typed(root))
        }
    }

    /// Decode a `<methodResponse>` body
    ///
    /// # Returns
    ///
    /// - `Ok(Response::Fault { .. })` - The document carried a `<fault>`
    /// - `Ok(Response::Success(..))` - The bare value for exactly one `<param>`,
    ///   otherwise an array of all params in order
    /// - `Err(..)` - Parse-kind error for malformed or non-XML-RPC bodies
    pub fn decode_response(data: &[u8]) -> Result<Response> {
        let text = std::str::from_utf8(data)
            .map_err(|e| RpcError::parse("Failed to parse XML response").with_source(e))?;
        let doc = parse_document(text)?;
        let root = doc.root_element();
        if !root.has_tag_name("methodResponse") {
            return Err(invalid_format());
        }

        if let Some(fault) = child_element(root, "fault") {
            let value = child_element(fault, "value")
                .map(decode_value_node)
                .unwrap_or(Value::Nil);
            let code = fault_code(value.get("faultCode"));
            let message = value
                .get("faultString")
                .map(text_of_value)
                .unwrap_or_default();
            return Ok(Response::Fault { code, message });
        }

        if let Some(params) = child_element(root, "params") {
            let mut values = decode_params(params);
            let payload = if values.len() == 1 {
                values.remove(0)
            } else {
                Value::Array(values)
            };
            return Ok(Response::Success(payload));
        }

        Err(invalid_format())
    }

    /// Decode a `<methodCall>` body
    pub fn decode_request(data: &[u8]) -> Result<MethodCall> {
        let text = std::str::from_utf8(data)
            .map_err(|e| RpcError::parse("Failed to parse XML request").with_source(e))?;
        let doc = parse_document(text)?;
        let root = doc.root_element();
        if !root.has_tag_name("methodCall") {
            return Err(RpcError::parse("Invalid XML-RPC request format"));
        }

        let method_name = child_element(root, "methodName")
            .map(|n| collect_text(n).trim().to_string())
            .ok_or_else(|| RpcError::parse("Missing methodName in request"))?;
        let params = child_element(root, "params")
            .map(decode_params)
            .unwrap_or_default();

        Ok(MethodCall { method_name, params })
    }
}

fn invalid_format() -> RpcError {
    RpcError::parse("Invalid XML-RPC response format")
}

fn parse_document(text: &str) -> Result<Document<'_>> {
    Document::parse(text).map_err(|e| RpcError::parse("Failed to parse XML response").with_source(e))
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Nil => out.push_str("<nil/>"),
        Value::String(s) => {
            out.push_str("<string>");
            escape_into(s, out);
            out.push_str("</string>");
        }
        Value::Int(i) => {
            out.push_str("<int>");
            out.push_str(&i.to_string());
            out.push_str("</int>");
        }
        Value::Double(d) => match integral(*d) {
            Some(i) => {
                out.push_str("<int>");
                out.push_str(&i.to_string());
                out.push_str("</int>");
            }
            None => {
                out.push_str("<double>");
                out.push_str(&d.to_string());
                out.push_str("</double>");
            }
        },
        Value::Bool(b) => {
            out.push_str("<boolean>");
            out.push_str(if *b { "1" } else { "0" });
            out.push_str("</boolean>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                out.push_str("<value>");
                write_value(item, out);
                out.push_str("</value>");
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                escape_into(name, out);
                out.push_str("</name><value>");
                write_value(member, out);
                out.push_str("</value></member>");
            }
            out.push_str("</struct>");
        }
        Value::Opaque { tag, text } => {
            out.push('<');
            out.push_str(tag);
            out.push('>');
            escape_into(text, out);
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

/// Integer form of a double with no fractional part, if it fits in an i64.
fn integral(d: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, hence the strict bound
    if d.is_finite() && d.fract() == 0.0 && d >= i64::MIN as f64 && d < i64::MAX as f64 {
        Some(d as i64)
    } else {
        None
    }
}

/// Escapes `&`, `<`, `>`, `"` and `'`, and writes `\r` as `&#13;`.
///
/// Single pass, so entities produced here are never escaped again.
/// Characters XML 1.0 cannot carry at all (C0 controls other than tab,
/// newline and carriage return, plus U+FFFE and U+FFFF) are replaced with
/// U+FFFD, so such strings do not survive a round trip.
fn escape_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            // a literal CR is folded into LF by the parser
            '\r' => out.push_str("&#13;"),
            '\t' | '\n' => out.push(c),
            c if c < '\u{20}' || c == '\u{FFFE}' || c == '\u{FFFF}' => {
                out.push(char::REPLACEMENT_CHARACTER)
            }
            _ => out.push(c),
        }
    }
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.is_element() && n.has_tag_name(name))
}

fn collect_text(node: Node<'_, '_>) -> String {
    node.children()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

fn decode_params(params: Node<'_, '_>) -> Vec<Value> {
    params
        .children()
        .filter(|n| n.is_element() && n.has_tag_name("param"))
        .map(|param| child_element(param, "value").map(decode_value_node).unwrap_or(Value::Nil))
        .collect()
}

/// Decodes a `<value>` element. An untyped value is a string.
fn decode_value_node(node: Node<'_, '_>) -> Value {
    match node.children().find(|n| n.is_element()) {
        Some(typed) => decode_typed(typed),
        None => Value::String(collect_text(node)),
    }
}

fn decode_typed(node: Node<'_, '_>) -> Value {
    let tag = node.tag_name().name();
    match tag {
        "nil" => Value::Nil,
        "string" => Value::String(collect_text(node)),
        "int" | "i4" | "i8" => decode_number(node, |s| s.parse::<i64>().ok().map(Value::Int)),
        "double" => decode_number(node, |s| s.parse::<f64>().ok().map(Value::Double)),
        "boolean" => {
            let text = collect_text(node);
            let text = text.trim();
            Value::Bool(text == "1" || text == "true")
        }
        "array" => {
            let items = child_element(node, "data")
                .map(|data| {
                    data.children()
                        .filter(|n| n.is_element() && n.has_tag_name("value"))
                        .map(decode_value_node)
                        .collect()
                })
                .unwrap_or_default();
            Value::Array(items)
        }
        "struct" => {
            let mut members = Struct::new();
            for member in node.children().filter(|n| n.is_element() && n.has_tag_name("member")) {
                let name = child_element(member, "name").map(collect_text).unwrap_or_default();
                let value = child_element(member, "value")
                    .map(decode_value_node)
                    .unwrap_or(Value::Nil);
                members.insert(name, value);
            }
            Value::Struct(members)
        }
        _ => opaque(node),
    }
}

/// Empty numeric bodies decode to an empty string; unparseable ones pass
/// through as opaque values.
fn decode_number(node: Node<'_, '_>, parse: impl Fn(&str) -> Option<Value>) -> Value {
    let text = collect_text(node);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::String(String::new());
    }
    parse(trimmed).unwrap_or_else(|| opaque(node))
}

fn opaque(node: Node<'_, '_>) -> Value {
    Value::Opaque {
        tag: node.tag_name().name().to_string(),
        text: node
            .descendants()
            .filter(|n| n.is_text())
            .filter_map(|n| n.text())
            .collect(),
    }
}

fn fault_code(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Int(code)) => *code,
        Some(Value::Double(code)) => integral(*code).unwrap_or(0),
        Some(Value::String(code)) => code.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn text_of_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Opaque { text, .. } => text.clone(),
        Value::Nil => String::new(),
        Value::Int(i) => i.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Bool(b) => b.to_string(),
        other => format!("{other:?}"),
    }
}
