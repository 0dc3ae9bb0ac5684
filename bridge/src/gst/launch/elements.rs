use super::{GstLaunch, LaunchError};
use crate::gst::handle::ElementHandle;
use gstlaunch_types::State;
use gstreamer as gst;
use gstreamer::prelude::*;
use std::sync::Arc;
use tracing::debug;

impl GstLaunch {
    /// Look up an element by name anywhere in the pipeline.
    ///
    /// The returned handle owns its own reference and stays valid after the
    /// pipeline is torn down.
    pub fn get_element(&self, name: &str) -> Result<ElementHandle, LaunchError> {
        self.with_open_context(|context, _| {
            context
                .pipeline
                .by_name(name)
                .map(ElementHandle::from)
                .ok_or_else(|| LaunchError::ElementNotFound(name.to_string()))
        })
    }

    /// Every element in the pipeline, including those inside nested bins.
    pub fn get_all_elements(&self) -> Result<Vec<ElementHandle>, LaunchError> {
        self.with_open_context(|context, _| {
            let mut iter = context.pipeline.iterate_recurse();
            let mut elements = Vec::new();
            loop {
                match iter.next() {
                    Ok(Some(element)) => elements.push(ElementHandle::from(element)),
                    Ok(None) => break,
                    Err(gst::IteratorError::Resync) => {
                        // The bin changed while iterating; start over
                        elements.clear();
                        iter.resync();
                    }
                    Err(gst::IteratorError::Error) => return Err(LaunchError::Iteration),
                }
            }
            Ok(elements)
        })
    }

    /// Set the end-of-stream callback, replacing any previous one.
    pub fn register_eos_callback<F>(&self, callback: F) -> Result<(), LaunchError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.with_open_context(|_, callbacks| {
            callbacks.eos = Some(Arc::new(callback));
            Ok(())
        })?;
        debug!("EOS callback registered for launch {}", self.id());
        Ok(())
    }

    /// Set the error callback, replacing any previous one.
    ///
    /// Without one, pipeline errors are only logged.
    pub fn register_error_callback<F>(&self, callback: F) -> Result<(), LaunchError>
    where
        F: Fn(Option<ElementHandle>, &str, Option<&str>) + Send + Sync + 'static,
    {
        self.with_open_context(|_, callbacks| {
            callbacks.error = Some(Arc::new(callback));
            Ok(())
        })?;
        debug!("Error callback registered for launch {}", self.id());
        Ok(())
    }

    /// Set the state callback, replacing any previous one.
    ///
    /// Called with old, new and pending state of the top-level pipeline, in
    /// bus order, before `active` is updated.
    pub fn register_state_callback<F>(&self, callback: F) -> Result<(), LaunchError>
    where
        F: Fn(State, State, State) + Send + Sync + 'static,
    {
        self.with_open_context(|_, callbacks| {
            callbacks.state = Some(Arc::new(callback));
            Ok(())
        })?;
        debug!("State callback registered for launch {}", self.id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_all_elements_recurses_into_bins() {
        let launch = GstLaunch::must_new(
            "fakesrc name=a ! fakesink name=b ( name=inner fakesrc name=c ! fakesink name=d )",
        );
        let mut names: Vec<String> = launch
            .get_all_elements()
            .unwrap()
            .iter()
            .map(ElementHandle::name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a", "b", "c", "d", "inner"]);
        launch.kill().unwrap();
    }

    #[test]
    fn test_get_element_not_found() {
        let launch = GstLaunch::must_new("fakesrc ! fakesink");
        match launch.get_element("missing") {
            Err(LaunchError::ElementNotFound(name)) => assert_eq!(name, "missing"),
            other => panic!("expected ElementNotFound, got {:?}", other),
        }
        launch.kill().unwrap();
    }

    #[test]
    fn test_element_operations_fail_once_closed() {
        let launch = GstLaunch::must_new("fakesrc name=src ! fakesink");
        launch.kill().unwrap();

        assert!(matches!(launch.get_element("src"), Err(LaunchError::Closed)));
        assert!(matches!(launch.get_all_elements(), Err(LaunchError::Closed)));
        assert!(matches!(
            launch.register_eos_callback(|| {}),
            Err(LaunchError::Closed)
        ));
        assert!(matches!(
            launch.register_error_callback(|_, _, _| {}),
            Err(LaunchError::Closed)
        ));
        assert!(matches!(
            launch.register_state_callback(|_, _, _| {}),
            Err(LaunchError::Closed)
        ));
        assert!(matches!(launch.start(), Err(LaunchError::Closed)));
        assert!(matches!(launch.kill(), Err(LaunchError::Closed)));
    }
}
