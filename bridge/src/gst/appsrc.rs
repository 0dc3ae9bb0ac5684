//! Pushing application bytes into a pipeline through `appsrc`.

use super::handle::ElementHandle;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppSourceError {
    #[error("Element '{0}' is not an appsrc")]
    NotAppSource(String),

    #[error("appsrc '{element}' refused data: {flow:?}")]
    Flow {
        element: String,
        flow: gst::FlowError,
    },
}

/// Data injection endpoint wrapping an `appsrc` element.
#[derive(Debug, Clone)]
pub struct AppSource {
    appsrc: gst_app::AppSrc,
}

impl AppSource {
    /// Wrap an element, which must be an `appsrc`.
    pub fn new(element: &ElementHandle) -> Result<Self, AppSourceError> {
        let appsrc = element
            .element()
            .clone()
            .downcast::<gst_app::AppSrc>()
            .map_err(|e| AppSourceError::NotAppSource(e.name().to_string()))?;
        Ok(Self { appsrc })
    }

    /// Name of the wrapped element.
    pub fn name(&self) -> String {
        self.appsrc.name().to_string()
    }

    /// Push one buffer.
    ///
    /// The bytes are copied into memory owned by GStreamer. An empty slice is
    /// ignored.
    pub fn push_buffer(&self, data: &[u8]) -> Result<(), AppSourceError> {
        if data.is_empty() {
            debug!("Ignoring empty buffer for appsrc '{}'", self.appsrc.name());
            return Ok(());
        }

        let buffer = gst::Buffer::from_slice(data.to_vec());
        self.appsrc
            .push_buffer(buffer)
            .map_err(|flow| AppSourceError::Flow {
                element: self.name(),
                flow,
            })?;
        trace!("Pushed {} bytes into appsrc '{}'", data.len(), self.appsrc.name());
        Ok(())
    }

    /// Signal end of stream.
    ///
    /// Pushes after this are not checked here; `appsrc` rejects them.
    pub fn eos(&self) -> Result<(), AppSourceError> {
        debug!("Sending EOS from appsrc '{}'", self.appsrc.name());
        self.appsrc
            .end_of_stream()
            .map_err(|flow| AppSourceError::Flow {
                element: self.name(),
                flow,
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_appsrc() {
        crate::gst::engine::init().unwrap();
        let sink: ElementHandle = gst::ElementFactory::make("fakesink")
            .name("not-a-source")
            .build()
            .unwrap()
            .into();
        assert_eq!(
            AppSource::new(&sink).unwrap_err(),
            AppSourceError::NotAppSource("not-a-source".to_string())
        );
    }

    #[test]
    fn test_empty_push_is_ignored() {
        crate::gst::engine::init().unwrap();
        let src: ElementHandle = gst::ElementFactory::make("appsrc")
            .name("src")
            .build()
            .unwrap()
            .into();
        let src = AppSource::new(&src).unwrap();
        assert_eq!(src.push_buffer(&[]), Ok(()));
        assert_eq!(src.name(), "src");
    }
}
