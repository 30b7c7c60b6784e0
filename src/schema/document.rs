//! Types inferred from hierarchical documents.
//!
//! JSON and XML input is first turned into a [`DocValue`] tree, then a type is inferred from
//! the tree:
//!
//! | Document value | Property type |
//! |----------------|---------------|
//! | string | `string` |
//! | number | `decimal?` (arbitrary precision) |
//! | boolean | `bool?` |
//! | null, undefined | `object` |
//! | object | a nested type, inferred recursively and compiled first |
//! | array | array of the type inferred from the first element, `object[]` if empty |
//!
//! Scalars are nullable so later rows of an array may omit values the first row had. Rows are
//! inferred from the first element only; keys of later elements that the first one lacks are
//! ignored when materializing.

use quick_xml::{events::Event, Reader};
use tracing::debug;

use crate::{
    descriptor::{PropertyMember, TypeDescriptor},
    runtime::{CompiledTypeRc, InstanceRc},
    synthesis::Synthesizer,
    typesystem::{PropertyBag, TypeSig, Value},
    Error, Result,
};

/// Template name of types inferred from JSON.
pub const JSON_TYPE_NAME: &str = "Typeforge.JsonObject";

/// Template name of types inferred from XML.
pub const XML_TYPE_NAME: &str = "Typeforge.XmlObject";

/// Key under which XML elements with attributes or children keep their text.
pub const XML_TEXT_KEY: &str = "#text";

/// A node of a parsed document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocValue {
    /// Explicit null
    Null,
    /// Absent value
    Undefined,
    /// Boolean leaf
    Bool(bool),
    /// Number leaf, digits preserved
    Number(serde_json::Number),
    /// String leaf
    String(String),
    /// Ordered list
    Array(Vec<DocValue>),
    /// Object with keys in document order
    Object(Vec<(String, DocValue)>),
}

impl DocValue {
    /// Parses JSON text.
    ///
    /// # Errors
    /// Returns [`Error::Json`] for invalid JSON.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Ok(value.into())
    }

    /// Parses XML text into the value of its root element.
    ///
    /// Elements become objects, attributes and text-only children become string leaves,
    /// repeated children become arrays and empty elements become null. Text of elements that
    /// also have attributes or children is kept under [`XML_TEXT_KEY`].
    ///
    /// # Errors
    /// Returns [`Error::Xml`] for invalid XML and [`Error::Malformed`] for documents without a
    /// root element or with undecodable text.
    pub fn from_xml_str(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
                    element.read_attributes(&start)?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    let mut element = Element::new(name);
                    element.read_attributes(&start)?;
                    close(&mut stack, &mut root, element);
                }
                Event::Text(content) => {
                    let content = content
                        .unescape()
                        .map_err(|err| malformed_error!("undecodable XML text: {}", err))?;
                    if let Some(element) = stack.last_mut() {
                        element.text.push_str(&content);
                    }
                }
                Event::CData(content) => {
                    if let Some(element) = stack.last_mut() {
                        element.text.push_str(&String::from_utf8_lossy(&content));
                    }
                }
                Event::End(_) => {
                    if let Some(element) = stack.pop() {
                        close(&mut stack, &mut root, element);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        root.ok_or_else(|| malformed_error!("XML document has no root element"))
    }

    /// The value under `key` of an object.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&DocValue> {
        match self {
            DocValue::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Name of the value kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DocValue::Null => "null",
            DocValue::Undefined => "undefined",
            DocValue::Bool(_) => "boolean",
            DocValue::Number(_) => "number",
            DocValue::String(_) => "string",
            DocValue::Array(_) => "array",
            DocValue::Object(_) => "object",
        }
    }

    /// Converts to a value without a declared type; objects become property bags.
    #[must_use]
    pub fn to_untyped(&self) -> Value {
        match self {
            DocValue::Null | DocValue::Undefined => Value::Null,
            DocValue::Bool(value) => Value::Bool(*value),
            DocValue::Number(number) => Value::Decimal(number.clone()),
            DocValue::String(text) => Value::from(text.as_str()),
            DocValue::Array(items) => Value::from(items.iter().map(DocValue::to_untyped).collect::<Vec<_>>()),
            DocValue::Object(entries) => {
                let bag = entries
                    .iter()
                    .fold(PropertyBag::new("object"), |bag, (key, value)| {
                        bag.with(key.as_str(), value.to_untyped())
                    });
                Value::Object(bag.into_object())
            }
        }
    }
}

impl From<serde_json::Value> for DocValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => DocValue::Null,
            serde_json::Value::Bool(value) => DocValue::Bool(value),
            serde_json::Value::Number(number) => DocValue::Number(number),
            serde_json::Value::String(text) => DocValue::String(text),
            serde_json::Value::Array(items) => {
                DocValue::Array(items.into_iter().map(DocValue::from).collect())
            }
            serde_json::Value::Object(map) => DocValue::Object(
                map.into_iter()
                    .map(|(key, value)| (key, DocValue::from(value)))
                    .collect(),
            ),
        }
    }
}

/// An XML element being read.
struct Element {
    name: String,
    entries: Vec<(String, DocValue)>,
    text: String,
}

impl Element {
    fn new(name: String) -> Self {
        Element {
            name,
            entries: Vec::new(),
            text: String::new(),
        }
    }

    fn read_attributes(&mut self, start: &quick_xml::events::BytesStart<'_>) -> Result<()> {
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|err| malformed_error!("invalid XML attribute: {}", err))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|err| malformed_error!("undecodable XML attribute '{}': {}", key, err))?;
            self.entries.push((key, DocValue::String(value.into_owned())));
        }
        Ok(())
    }

    fn into_value(self) -> DocValue {
        let text = self.text.trim();
        if self.entries.is_empty() {
            return if text.is_empty() {
                DocValue::Null
            } else {
                DocValue::String(text.to_string())
            };
        }

        let mut entries = self.entries;
        if !text.is_empty() {
            entries.push((XML_TEXT_KEY.to_string(), DocValue::String(text.to_string())));
        }
        DocValue::Object(entries)
    }
}

fn close(stack: &mut [Element], root: &mut Option<DocValue>, element: Element) {
    let name = element.name.clone();
    let value = element.into_value();
    let Some(parent) = stack.last_mut() else {
        root.get_or_insert(value);
        return;
    };

    match parent.entries.iter_mut().find(|(key, _)| *key == name) {
        Some((_, DocValue::Array(items))) => items.push(value),
        Some((_, existing)) => {
            let first = std::mem::replace(existing, DocValue::Null);
            *existing = DocValue::Array(vec![first, value]);
        }
        None => parent.entries.push((name, value)),
    }
}

fn infer_type(synthesizer: &Synthesizer, value: &DocValue, name: &str) -> Result<TypeSig> {
    Ok(match value {
        DocValue::Null | DocValue::Undefined => TypeSig::Object,
        DocValue::Bool(_) => TypeSig::Boolean.to_nullable(),
        DocValue::Number(_) => TypeSig::Decimal.to_nullable(),
        DocValue::String(_) => TypeSig::String,
        DocValue::Object(_) => {
            let mut nested = infer_document(synthesizer, value, name)?;
            TypeSig::Class(synthesizer.compile(&mut nested)?)
        }
        DocValue::Array(items) => TypeSig::Array(Box::new(match items.first() {
            Some(first) => infer_type(synthesizer, first, name)?,
            None => TypeSig::Object,
        })),
    })
}

/// Infers a type from the object `document`.
///
/// Nested object types are compiled on `synthesizer` right away, the returned root
/// descriptor is not.
///
/// # Errors
/// Returns [`Error::Malformed`] if `document` is not an object, and any synthesis error of a
/// nested type.
pub fn infer_document(synthesizer: &Synthesizer, document: &DocValue, name: &str) -> Result<TypeDescriptor> {
    let DocValue::Object(entries) = document else {
        return Err(malformed_error!(
            "document root must be an object, found {}",
            document.kind()
        ));
    };

    let mut descriptor = TypeDescriptor::new(name);
    for (key, value) in entries {
        let ty = infer_type(synthesizer, value, &format!("{name}.{key}"))?;
        descriptor.add_member(PropertyMember::new(key.as_str(), ty));
    }
    Ok(descriptor)
}

fn convert(value: &DocValue, ty: &TypeSig) -> Result<Value> {
    match (value, ty.underlying()) {
        (DocValue::Null | DocValue::Undefined, _) => Ok(Value::Null),
        (_, TypeSig::Object) => Ok(value.to_untyped()),
        (DocValue::Object(_), TypeSig::Class(nested)) => Ok(materialize(nested, value)?.to_value()),
        (DocValue::Array(items), TypeSig::Array(element)) => Ok(Value::from(
            items
                .iter()
                .map(|item| convert(item, element))
                .collect::<Result<Vec<_>>>()?,
        )),
        (DocValue::Bool(flag), _) => Ok(Value::Bool(*flag)),
        (DocValue::Number(number), _) => Ok(Value::Decimal(number.clone())),
        (DocValue::String(text), _) => Ok(Value::from(text.as_str())),
        (DocValue::Object(_) | DocValue::Array(_), _) => Err(Error::TypeMismatch {
            expected: ty.to_string(),
            found: value.kind().to_string(),
        }),
    }
}

/// Creates an instance of `ty` filled from the object `document`.
///
/// Keys without a same-named property are skipped.
///
/// # Errors
/// Returns [`Error::Malformed`] if `document` is not an object and [`Error::TypeMismatch`] if
/// a value does not fit its property.
pub fn materialize(ty: &CompiledTypeRc, document: &DocValue) -> Result<InstanceRc> {
    let DocValue::Object(entries) = document else {
        return Err(malformed_error!("expected an object, found {}", document.kind()));
    };

    let instance = ty.create_instance(&[])?;
    for (key, value) in entries {
        if let Some(property) = ty.property(key) {
            property.set(&instance, &[], convert(value, property.ty())?)?;
        }
    }
    Ok(instance)
}

/// Infers, compiles and fills a type from `document`.
///
/// # Errors
/// See [`infer_document`] and [`materialize`].
pub fn document_to_object(synthesizer: &Synthesizer, document: &DocValue, name: &str) -> Result<InstanceRc> {
    let mut descriptor = infer_document(synthesizer, document, name)?;
    let ty = synthesizer.compile(&mut descriptor)?;
    debug!(ty = %ty.name(), properties = ty.properties().len(), "document type compiled");
    materialize(&ty, document)
}

/// [`document_to_object`] for JSON text.
///
/// # Errors
/// Returns [`Error::Json`] for invalid JSON, otherwise see [`document_to_object`].
///
/// # Examples
///
/// ```rust
/// use typeforge::prelude::*;
///
/// let synthesizer = Synthesizer::with_default_host();
/// let root = json_to_object(&synthesizer, r#"{"name":"ada","age":36}"#)?;
/// assert_eq!(root.get("name")?, Value::from("ada"));
/// assert_eq!(root.get("age")?.as_i64(), Some(36));
/// # Ok::<(), typeforge::Error>(())
/// ```
pub fn json_to_object(synthesizer: &Synthesizer, text: &str) -> Result<InstanceRc> {
    document_to_object(synthesizer, &DocValue::from_json_str(text)?, JSON_TYPE_NAME)
}

/// [`document_to_object`] for XML text.
///
/// # Errors
/// Returns [`Error::Xml`] for invalid XML, otherwise see [`document_to_object`].
pub fn xml_to_object(synthesizer: &Synthesizer, text: &str) -> Result<InstanceRc> {
    document_to_object(synthesizer, &DocValue::from_xml_str(text)?, XML_TYPE_NAME)
}
