//! Typed property access on element handles.

use super::handle::ElementHandle;
use gstlaunch_types::{PropertyKind, PropertyValue};
use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ElementError {
    #[error("Property {element}.{property} not found")]
    PropertyNotFound { element: String, property: String },

    #[error("Property {element}.{property} has unsupported type {type_name}")]
    UnsupportedType {
        element: String,
        property: String,
        type_name: String,
    },

    #[error("Property {element}.{property} expects {expected}, got {actual}")]
    TypeMismatch {
        element: String,
        property: String,
        expected: PropertyKind,
        actual: PropertyKind,
    },

    #[error("Property {element}.{property} is not writable")]
    NotWritable { element: String, property: String },

    #[error("Property {element}.{property} is not readable")]
    NotReadable { element: String, property: String },

    #[error("Value {value} out of range for {element}.{property} ({min}..={max})")]
    OutOfRange {
        element: String,
        property: String,
        value: String,
        min: String,
        max: String,
    },
}

/// Map a property value type onto the supported kinds.
fn kind_of(type_: glib::Type) -> Option<PropertyKind> {
    if type_ == glib::Type::I32 {
        Some(PropertyKind::Int)
    } else if type_ == glib::Type::U32 {
        Some(PropertyKind::UInt)
    } else if type_ == glib::Type::STRING {
        Some(PropertyKind::String)
    } else {
        None
    }
}

impl ElementHandle {
    /// Read a property.
    ///
    /// Must not be called from a bus callback of the pipeline owning this
    /// element; the calling thread may hold locks the read needs.
    pub fn property(&self, name: &str) -> Result<PropertyValue, ElementError> {
        // Hold our own reference for the duration of the call, so a pipeline
        // teardown on another thread cannot release the element under us.
        let element = self.element().clone();

        let pspec = element
            .find_property(name)
            .ok_or_else(|| not_found(&element, name))?;
        // The binding panics when reading a write-only property
        if !pspec.flags().contains(glib::ParamFlags::READABLE) {
            return Err(ElementError::NotReadable {
                element: element.name().to_string(),
                property: name.to_string(),
            });
        }
        let kind = kind_of(pspec.value_type())
            .ok_or_else(|| unsupported(&element, name, pspec.value_type()))?;

        let value = match kind {
            PropertyKind::Int => PropertyValue::Int(element.property::<i32>(name)),
            PropertyKind::UInt => PropertyValue::UInt(element.property::<u32>(name)),
            PropertyKind::String => PropertyValue::String(
                element
                    .property::<Option<String>>(name)
                    .unwrap_or_default(),
            ),
        };
        Ok(value)
    }

    /// Write a property.
    ///
    /// The value kind must match the property type exactly. The write is
    /// synchronous and not confirmed; read it back to verify.
    pub fn set_property(
        &self,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<(), ElementError> {
        let value = value.into();
        let element = self.element().clone();

        let pspec = element
            .find_property(name)
            .ok_or_else(|| not_found(&element, name))?;
        let expected = kind_of(pspec.value_type())
            .ok_or_else(|| unsupported(&element, name, pspec.value_type()))?;

        if expected != value.kind() {
            return Err(ElementError::TypeMismatch {
                element: element.name().to_string(),
                property: name.to_string(),
                expected,
                actual: value.kind(),
            });
        }

        let flags = pspec.flags();
        if !flags.contains(glib::ParamFlags::WRITABLE)
            || flags.contains(glib::ParamFlags::CONSTRUCT_ONLY)
        {
            return Err(ElementError::NotWritable {
                element: element.name().to_string(),
                property: name.to_string(),
            });
        }

        check_range(&element, name, &pspec, &value)?;

        debug!("Setting property: {}.{} = {}", element.name(), name, value);
        match value {
            PropertyValue::Int(v) => element.set_property(name, v),
            PropertyValue::UInt(v) => element.set_property(name, v),
            PropertyValue::String(v) => element.set_property(name, v),
        }
        Ok(())
    }
}

/// The binding aborts on out-of-range integers, so check them up front.
fn check_range(
    element: &gst::Element,
    name: &str,
    pspec: &glib::ParamSpec,
    value: &PropertyValue,
) -> Result<(), ElementError> {
    let out_of_range = |min: String, max: String| ElementError::OutOfRange {
        element: element.name().to_string(),
        property: name.to_string(),
        value: value.to_string(),
        min,
        max,
    };

    match value {
        PropertyValue::Int(v) => {
            if let Some(spec) = pspec.downcast_ref::<glib::ParamSpecInt>() {
                if *v < spec.minimum() || *v > spec.maximum() {
                    return Err(out_of_range(
                        spec.minimum().to_string(),
                        spec.maximum().to_string(),
                    ));
                }
            }
        }
        PropertyValue::UInt(v) => {
            if let Some(spec) = pspec.downcast_ref::<glib::ParamSpecUInt>() {
                if *v < spec.minimum() || *v > spec.maximum() {
                    return Err(out_of_range(
                        spec.minimum().to_string(),
                        spec.maximum().to_string(),
                    ));
                }
            }
        }
        PropertyValue::String(_) => {}
    }
    Ok(())
}

fn not_found(element: &gst::Element, property: &str) -> ElementError {
    ElementError::PropertyNotFound {
        element: element.name().to_string(),
        property: property.to_string(),
    }
}

fn unsupported(element: &gst::Element, property: &str, type_: glib::Type) -> ElementError {
    ElementError::UnsupportedType {
        element: element.name().to_string(),
        property: property.to_string(),
        type_name: type_.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Element with a single write-only integer property.
    mod write_only {
        use gstreamer as gst;
        use gstreamer::glib;
        use gstreamer::subclass::prelude::*;
        use gstreamer::glib::prelude::ParamSpecBuilderExt;
        use std::sync::atomic::{AtomicI32, Ordering};
        use std::sync::LazyLock;

        #[derive(Default)]
        pub struct Imp {
            pub secret: AtomicI32,
        }

        #[glib::object_subclass]
        impl ObjectSubclass for Imp {
            const NAME: &'static str = "GstLaunchWriteOnlyTest";
            type Type = WriteOnly;
            type ParentType = gst::Element;
        }

        impl ObjectImpl for Imp {
            fn properties() -> &'static [glib::ParamSpec] {
                static PROPERTIES: LazyLock<Vec<glib::ParamSpec>> = LazyLock::new(|| {
                    vec![glib::ParamSpecInt::builder("secret")
                        .minimum(0)
                        .maximum(100)
                        .write_only()
                        .build()]
                });
                PROPERTIES.as_ref()
            }

            fn set_property(&self, _id: usize, value: &glib::Value, pspec: &glib::ParamSpec) {
                match pspec.name() {
                    "secret" => self
                        .secret
                        .store(value.get().unwrap(), Ordering::SeqCst),
                    other => unimplemented!("property {}", other),
                }
            }
        }

        impl GstObjectImpl for Imp {}
        impl ElementImpl for Imp {}

        glib::wrapper! {
            pub struct WriteOnly(ObjectSubclass<Imp>) @extends gst::Element, gst::Object;
        }
    }

    fn fakesink() -> ElementHandle {
        crate::gst::engine::init().unwrap();
        gst::ElementFactory::make("fakesink")
            .name("fakesink")
            .build()
            .unwrap()
            .into()
    }

    #[test]
    fn test_get_property_int() {
        let e = fakesink();
        assert_eq!(e.property("num-buffers"), Ok(PropertyValue::Int(-1)));
    }

    #[test]
    fn test_set_property_int() {
        let e = fakesink();
        e.set_property("num-buffers", 11).unwrap();
        assert_eq!(e.property("num-buffers"), Ok(PropertyValue::Int(11)));
    }

    #[test]
    fn test_set_property_string() {
        let e = fakesink();
        e.set_property("name", "the-element").unwrap();
        assert_eq!(
            e.property("name"),
            Ok(PropertyValue::String("the-element".to_string()))
        );
        assert_eq!(e.name(), "the-element");
    }

    #[test]
    fn test_uint_property_round_trip() {
        crate::gst::engine::init().unwrap();
        let queue: ElementHandle = gst::ElementFactory::make("queue").build().unwrap().into();
        queue.set_property("max-size-buffers", 42u32).unwrap();
        assert_eq!(queue.property("max-size-buffers"), Ok(PropertyValue::UInt(42)));
    }

    #[test]
    fn test_missing_property_is_not_found() {
        let e = fakesink();
        assert!(matches!(
            e.property("no-such-property"),
            Err(ElementError::PropertyNotFound { .. })
        ));
        assert!(matches!(
            e.set_property("no-such-property", 1),
            Err(ElementError::PropertyNotFound { .. })
        ));
    }

    #[test]
    fn test_unsupported_type_is_distinct_from_not_found() {
        let e = fakesink();
        // "sync" is a gboolean
        match e.property("sync") {
            Err(ElementError::UnsupportedType { type_name, .. }) => {
                assert_eq!(type_name, "gboolean")
            }
            other => panic!("expected UnsupportedType, got {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch() {
        let e = fakesink();
        assert!(matches!(
            e.set_property("num-buffers", "eleven"),
            Err(ElementError::TypeMismatch {
                expected: PropertyKind::Int,
                actual: PropertyKind::String,
                ..
            })
        ));
        assert_eq!(e.property("num-buffers"), Ok(PropertyValue::Int(-1)));
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let e = fakesink();
        // num-buffers has a minimum of -1
        assert!(matches!(
            e.set_property("num-buffers", -5),
            Err(ElementError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_read_only_property_is_not_writable() {
        let e = fakesink();
        // "last-message" is read-only
        assert!(matches!(
            e.set_property("last-message", "x"),
            Err(ElementError::NotWritable { .. })
        ));
    }

    #[test]
    fn test_write_only_property_is_not_readable() {
        use gstreamer::subclass::prelude::ObjectSubclassIsExt;

        crate::gst::engine::init().unwrap();
        let object = glib::Object::builder::<write_only::WriteOnly>()
            .property("name", "holder")
            .build();
        let e = ElementHandle::from(object.clone().upcast::<gst::Element>());

        assert_eq!(
            e.property("secret"),
            Err(ElementError::NotReadable {
                element: "holder".to_string(),
                property: "secret".to_string(),
            })
        );
        e.set_property("secret", 42).unwrap();
        assert_eq!(
            object.imp().secret.load(std::sync::atomic::Ordering::SeqCst),
            42
        );
    }

    #[test]
    fn test_property_access_leaves_ref_count_unchanged() {
        let e = fakesink();
        let before = e.element().ref_count();
        let _ = e.property("num-buffers");
        let _ = e.property("no-such-property");
        let _ = e.set_property("num-buffers", "bad");
        assert_eq!(e.element().ref_count(), before);
    }
}
