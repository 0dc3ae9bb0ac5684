//! Owned element references.

use gstlaunch_types::State;
use gstreamer as gst;
use gstreamer::glib::translate::{FromGlibPtrFull, IntoGlibPtr};
use gstreamer::prelude::*;
use tracing::trace;

/// Owns exactly one reference to a GStreamer element.
///
/// The reference is given back by [`ElementHandle::release`], which consumes
/// the handle so it cannot be used afterwards. Dropping an unreleased handle
/// releases it too; that path only exists to avoid leaks and should not be
/// relied on for ordering. Cloning takes an additional reference.
#[derive(Debug, Clone)]
pub struct ElementHandle {
    element: gst::Element,
}

impl ElementHandle {
    /// Adopt a reference the caller already owns, without taking another.
    ///
    /// # Safety
    ///
    /// `ptr` must be a valid, non-null `GstElement` and the caller must own
    /// one full reference to it, which is transferred to the handle.
    pub unsafe fn from_raw_full(ptr: *mut gst::ffi::GstElement) -> Self {
        Self {
            element: gst::Element::from_glib_full(ptr),
        }
    }

    /// Give the reference back to the caller as a raw pointer.
    ///
    /// The caller becomes responsible for unreferencing it.
    pub fn into_raw(self) -> *mut gst::ffi::GstElement {
        let Self { element } = self;
        element.into_glib_ptr()
    }

    /// Raw pointer of the element. Never null for a live handle.
    pub fn as_ptr(&self) -> *mut gst::ffi::GstElement {
        self.element.as_ptr()
    }

    /// Borrow the wrapped element.
    pub fn element(&self) -> &gst::Element {
        &self.element
    }

    /// Element name.
    pub fn name(&self) -> String {
        self.element.name().to_string()
    }

    /// Name of the factory the element was created from, if any.
    pub fn factory_name(&self) -> Option<String> {
        self.element
            .factory()
            .map(|factory| factory.name().to_string())
    }

    /// Current state of the element.
    pub fn state(&self) -> State {
        super::to_state(self.element.current_state())
    }

    /// Release the reference now.
    pub fn release(self) {
        trace!("Releasing element '{}'", self.element.name());
    }
}

impl From<gst::Element> for ElementHandle {
    fn from(element: gst::Element) -> Self {
        Self { element }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fakesink() -> gst::Element {
        crate::gst::engine::init().unwrap();
        gst::ElementFactory::make("fakesink")
            .name("fakesink")
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_element_starts_in_null() {
        let handle = ElementHandle::from(fakesink());
        assert_eq!(handle.state(), State::Null);
        assert_eq!(handle.name(), "fakesink");
        assert_eq!(handle.factory_name().as_deref(), Some("fakesink"));
        assert!(!handle.as_ptr().is_null());
    }

    #[test]
    fn test_release_drops_exactly_one_reference() {
        let element = fakesink();
        let handle = ElementHandle::from(element.clone());
        assert_eq!(element.ref_count(), 2);

        handle.release();
        assert_eq!(element.ref_count(), 1);
    }

    #[test]
    fn test_drop_releases_unreleased_handle() {
        let element = fakesink();
        {
            let _handle = ElementHandle::from(element.clone());
            assert_eq!(element.ref_count(), 2);
        }
        assert_eq!(element.ref_count(), 1);
    }

    #[test]
    fn test_clone_takes_its_own_reference() {
        let element = fakesink();
        let handle = ElementHandle::from(element.clone());
        let cloned = handle.clone();
        assert_eq!(element.ref_count(), 3);

        handle.release();
        assert_eq!(element.ref_count(), 2);
        assert_eq!(cloned.name(), "fakesink");
    }

    #[test]
    fn test_raw_round_trip_adopts_without_extra_ref() {
        let element = fakesink();
        let raw: *mut gst::ffi::GstElement = element.clone().into_glib_ptr();
        let handle = unsafe { ElementHandle::from_raw_full(raw) };
        assert_eq!(element.ref_count(), 2);

        let raw = handle.into_raw();
        assert_eq!(element.ref_count(), 2);
        let handle = unsafe { ElementHandle::from_raw_full(raw) };
        handle.release();
        assert_eq!(element.ref_count(), 1);
    }
}
