//! Integration tests for forwarding proxies.
//!
//! Targets are property bags, synthesized instances and hand-written [`DynObject`]s. Release
//! order is observed through a recording [`ForeignRelease`].

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, RwLock,
};

use typeforge::prelude::*;

/// Remembers the type name of every released target, in order.
#[derive(Default)]
struct Recorder {
    released: Mutex<Vec<String>>,
}

impl Recorder {
    fn released(&self) -> Vec<String> {
        self.released.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ForeignRelease for Recorder {
    fn release(&self, target: &Value) -> Result<()> {
        let name = target
            .as_object()
            .map(|object| object.type_name().to_string())
            .unwrap_or_default();
        self.released.lock()?.push(name);
        Ok(())
    }
}

/// A foreign counter with a property and a method.
#[derive(Debug, Default)]
struct Counter {
    value: RwLock<i32>,
}

impl DynObject for Counter {
    fn type_name(&self) -> &str {
        "Counter"
    }

    fn get(&self, name: &str, _index: &[Value]) -> Result<Value> {
        match name {
            "Value" => Ok(Value::I32(*self.value.read()?)),
            _ => Err(missing(name)),
        }
    }

    fn set(&self, name: &str, _index: &[Value], value: Value) -> Result<()> {
        match (name, value) {
            ("Value", Value::I32(value)) => {
                *self.value.write()? = value;
                Ok(())
            }
            (_, value) => Err(Error::TypeMismatch {
                expected: "int32".into(),
                found: value.describe(),
            }),
        }
    }

    fn invoke(&self, name: &str, _args: &[Value]) -> Result<Value> {
        match name {
            "Increment" => {
                let mut value = self.value.write()?;
                *value += 1;
                Ok(Value::I32(*value))
            }
            _ => Err(missing(name)),
        }
    }
}

/// A foreign resource that must be disposed exactly once.
#[derive(Debug, Default)]
struct Handle {
    disposed: AtomicUsize,
}

impl DynObject for Handle {
    fn type_name(&self) -> &str {
        "Handle"
    }

    fn get(&self, name: &str, _index: &[Value]) -> Result<Value> {
        match name {
            "Path" => Ok(Value::from("/dev/null")),
            _ => Err(missing(name)),
        }
    }

    fn set(&self, name: &str, _index: &[Value], _value: Value) -> Result<()> {
        Err(missing(name))
    }

    fn invoke(&self, name: &str, _args: &[Value]) -> Result<Value> {
        match name {
            "Dispose" => {
                self.disposed.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            }
            _ => Err(missing(name)),
        }
    }

    fn implements(&self, capability: &str) -> bool {
        capability == Capability::DISPOSABLE
    }
}

/// A foreign factory handing out new foreign children.
#[derive(Debug)]
struct Opener;

impl DynObject for Opener {
    fn type_name(&self) -> &str {
        "Opener"
    }

    fn get(&self, name: &str, _index: &[Value]) -> Result<Value> {
        Err(missing(name))
    }

    fn set(&self, name: &str, _index: &[Value], _value: Value) -> Result<()> {
        Err(missing(name))
    }

    fn invoke(&self, name: &str, _args: &[Value]) -> Result<Value> {
        match name {
            "Open" => Ok(Value::Object(
                PropertyBag::new("ChildTarget").with("Name", "opened").into_object(),
            )),
            _ => Err(missing(name)),
        }
    }
}

/// A foreign sink with an overloaded `Write`.
#[derive(Debug, Default)]
struct Sink {
    written: Mutex<Vec<String>>,
}

impl DynObject for Sink {
    fn type_name(&self) -> &str {
        "Sink"
    }

    fn get(&self, name: &str, _index: &[Value]) -> Result<Value> {
        Err(missing(name))
    }

    fn set(&self, name: &str, _index: &[Value], _value: Value) -> Result<()> {
        Err(missing(name))
    }

    fn invoke(&self, name: &str, args: &[Value]) -> Result<Value> {
        let line = match (name, args) {
            ("Write", [Value::String(text)]) => format!("text {text}"),
            ("Write", [Value::I32(number)]) => format!("number {number}"),
            _ => return Err(missing(name)),
        };
        self.written.lock()?.push(line);
        Ok(Value::Null)
    }
}

fn missing(member: &str) -> Error {
    Error::MissingMember {
        owner: "foreign".into(),
        member: member.into(),
    }
}

fn child_capability() -> CapabilityRc {
    CapabilityBuilder::new("Test.IChild")
        .property("Name", TypeSig::String)
        .marker(Capability::FOREIGN)
        .build()
}

fn parent_capability() -> CapabilityRc {
    CapabilityBuilder::new("Test.IParent")
        .property("Title", TypeSig::String)
        .property("Child", TypeSig::Capability(child_capability()))
        .marker(Capability::FOREIGN)
        .build()
}

fn parent_target() -> Value {
    let child = PropertyBag::new("ChildTarget").with("Name", "child").into_object();
    Value::Object(
        PropertyBag::new("ParentTarget")
            .with("Title", "parent")
            .with("Child", Value::Object(child))
            .into_object(),
    )
}

/// A proxy over a synthesized instance forwards reads and writes both ways.
#[test]
fn test_detour_over_synthesized_instance() -> Result<()> {
    let synthesizer = Synthesizer::with_default_host();
    let named = CapabilityBuilder::new("Test.INamed")
        .property("Name", TypeSig::String)
        .build();

    let mut person = TypeDescriptor::new("Person");
    person.add_member(PropertyMember::from_capability(&named, "Name")?);
    let person = synthesizer.compile(&mut person)?.create_instance(&[])?;

    let proxies = ProxyFactory::new(synthesizer);
    let proxy = proxies.wrap(&named, person.to_value())?;

    proxy.set("Name", "through proxy")?;
    assert_eq!(person.get("Name")?, Value::from("through proxy"));

    person.set("Name", "direct")?;
    assert_eq!(proxy.get("Name")?, Value::from("direct"));
    assert_eq!(proxy.get_via("Test.INamed", "Name")?, Value::from("direct"));
    Ok(())
}

/// A proxy over a hand-written object forwards properties and methods.
#[test]
fn test_detour_over_custom_object() -> Result<()> {
    let counter_capability = CapabilityBuilder::new("Test.ICounter")
        .property("Value", TypeSig::I4)
        .method("Increment", TypeSig::I4, vec![])
        .build();
    let counter = Arc::new(Counter::default());

    let proxies = ProxyFactory::new(Synthesizer::with_default_host());
    let proxy = proxies.wrap(&counter_capability, Value::Object(counter.clone()))?;

    assert_eq!(proxy.invoke("Increment", &[])?, Value::I32(1));
    assert_eq!(proxy.invoke_via("Test.ICounter", "Increment", &[])?, Value::I32(2));
    assert_eq!(proxy.get("Value")?, Value::I32(2));

    proxy.set("Value", 10)?;
    assert_eq!(*counter.value.read()?, 10);
    Ok(())
}

/// Every overload of a capability method is forwarded.
#[test]
fn test_detour_over_overloaded_methods() -> Result<()> {
    let writer = CapabilityBuilder::new("Test.IWriter")
        .method("Write", TypeSig::Void, vec![TypeSig::String])
        .method("Write", TypeSig::Void, vec![TypeSig::I4])
        .build();
    let sink = Arc::new(Sink::default());

    let proxies = ProxyFactory::new(Synthesizer::with_default_host());
    let proxy = proxies.wrap(&writer, Value::Object(sink.clone()))?;

    proxy.invoke("Write", &[Value::from("a")])?;
    proxy.invoke("Write", &[Value::I32(1)])?;
    proxy.invoke_via("Test.IWriter", "Write", &[Value::I32(2)])?;
    proxy.invoke_via("Test.IWriter", "Write", &[Value::from("b")])?;

    assert_eq!(*sink.written.lock()?, ["text a", "number 1", "number 2", "text b"]);
    assert_eq!(
        proxy
            .compiled_type()
            .dispatch("Test.IWriter", "Write")
            .map(|dispatch| dispatch.methods().len()),
        Some(2)
    );
    Ok(())
}

/// Disposing twice releases the target once and never fails.
#[test]
fn test_dispose_idempotent() -> Result<()> {
    let file = CapabilityBuilder::new("Test.IFile")
        .property("Path", TypeSig::String)
        .build();
    let handle = Arc::new(Handle::default());

    let proxies = ProxyFactory::new(Synthesizer::with_default_host());
    let proxy = proxies.wrap(&file, Value::Object(handle.clone()))?;
    assert_eq!(proxy.get("Path")?, Value::from("/dev/null"));

    proxy.dispose()?;
    proxy.dispose()?;
    proxy.invoke_via(Capability::DISPOSABLE, "Dispose", &[])?;
    assert_eq!(handle.disposed.load(Ordering::SeqCst), 1);

    drop(proxy);
    assert_eq!(handle.disposed.load(Ordering::SeqCst), 1);
    Ok(())
}

/// Nested proxies are built lazily, reused, and disposed before their parent's target.
#[test]
fn test_dispose_cascades_to_materialized_children() -> Result<()> {
    let recorder = Arc::new(Recorder::default());
    let proxies = ProxyFactory::with_release(Synthesizer::with_default_host(), recorder.clone());

    let parent = proxies.wrap(&parent_capability(), parent_target())?;
    assert_eq!(parent.get("Title")?, Value::from("parent"));

    let child = parent.get("Child")?;
    let child_proxy = child.as_instance().ok_or(Error::Error("child proxy".into()))?;
    assert_eq!(child_proxy.compiled_type().name(), "Managed_Test.IChild");
    assert_eq!(child_proxy.get("Name")?, Value::from("child"));
    assert_eq!(parent.get("Child")?, child);
    assert_eq!(parent.field("source_Child")?, child);

    parent.dispose()?;
    assert_eq!(recorder.released(), ["ChildTarget", "ParentTarget"]);

    parent.dispose()?;
    child_proxy.dispose()?;
    assert_eq!(recorder.released().len(), 2);
    Ok(())
}

/// A nested proxy that was never read is never created, so nothing of it is released.
#[test]
fn test_unmaterialized_child_not_released() -> Result<()> {
    let recorder = Arc::new(Recorder::default());
    let proxies = ProxyFactory::with_release(Synthesizer::with_default_host(), recorder.clone());

    let parent = proxies.wrap(&parent_capability(), parent_target())?;
    assert_eq!(parent.get("Title")?, Value::from("parent"));
    assert!(parent.field("source_Child")?.is_null());

    parent.dispose()?;
    assert_eq!(recorder.released(), ["ParentTarget"]);
    assert!(!proxies.registry().contains("Test.IChild"));
    Ok(())
}

/// Dropping an undisposed proxy releases its target through the finalizer.
#[test]
fn test_finalizer_releases() -> Result<()> {
    let recorder = Arc::new(Recorder::default());
    let proxies = ProxyFactory::with_release(Synthesizer::with_default_host(), recorder.clone());

    let parent = proxies.wrap(&parent_capability(), parent_target())?;
    assert!(recorder.released().is_empty());

    drop(parent);
    assert_eq!(recorder.released(), ["ParentTarget"]);
    Ok(())
}

/// Foreign method results are wrapped on every call.
#[test]
fn test_method_results_wrapped_per_call() -> Result<()> {
    let opener_capability = CapabilityBuilder::new("Test.IOpener")
        .method("Open", TypeSig::Capability(child_capability()), vec![])
        .build();

    let proxies = ProxyFactory::new(Synthesizer::with_default_host());
    let opener = proxies.wrap(&opener_capability, Value::Object(Arc::new(Opener)))?;

    let first = opener.invoke("Open", &[])?;
    let second = opener.invoke("Open", &[])?;
    assert_ne!(first, second);

    let first = first.as_instance().ok_or(Error::Error("opened proxy".into()))?;
    assert!(first.compiled_type().implements("Test.IChild"));
    assert_eq!(first.get("Name")?, Value::from("opened"));
    assert!(proxies.registry().contains("Test.IChild"));
    Ok(())
}

/// Concurrent first use builds one wrapper type.
#[test]
fn test_wrapper_type_built_once_across_threads() -> Result<()> {
    let proxies = ProxyFactory::new(Synthesizer::with_default_host());
    let capability = child_capability();

    let types = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| proxies.wrapper_type(&capability)))
            .collect();
        workers
            .into_iter()
            .map(|worker| {
                worker
                    .join()
                    .map_err(|_| Error::Error("thread panicked".into()))?
            })
            .collect::<Result<Vec<_>>>()
    })?;

    assert_eq!(proxies.registry().len(), 1);
    assert!(types.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    Ok(())
}
