use std::panic::Location;
use std::sync::Arc;

use glimpse_core::{canonicalize, Inspect};
use parking_lot::RwLock;

use crate::config::DumpConfig;
use crate::error::{Error, Result};
use crate::queue::{Completion, TransmissionQueue};
use crate::render::LocalRenderer;
use crate::source::{FileSourceLocator, SourceLocator};
use crate::transport::{HttpTransport, Transport};

/// Front end for dumping values to a viewer
///
/// Owns the transmission queue; create one per process (or per viewer)
/// and share it by reference.
pub struct Dumper {
    config: RwLock<DumpConfig>,
    queue: TransmissionQueue,
    renderer: Option<Arc<dyn LocalRenderer>>,
    locator: Arc<dyn SourceLocator>,
}

impl Dumper {
    /// Create a dumper sending through `transport`
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: DumpConfig, transport: impl Transport + 'static) -> Result<Self> {
        let queue = TransmissionQueue::new(transport)?;
        queue.set_timeout(config.timeout());

        Ok(Self {
            config: RwLock::new(config),
            queue,
            renderer: None,
            locator: Arc::new(FileSourceLocator::new()),
        })
    }

    /// Create a dumper talking HTTP to the configured viewer
    pub fn http(config: DumpConfig) -> Result<Self> {
        Self::new(config, HttpTransport::new()?)
    }

    /// Render locally instead of sending anything
    pub fn with_renderer(mut self, renderer: impl LocalRenderer + 'static) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn with_locator(mut self, locator: impl SourceLocator + 'static) -> Self {
        self.locator = Arc::new(locator);
        self
    }

    /// Dump a value
    ///
    /// The value is snapshotted and queued before this returns, so later
    /// changes to it are not reflected, and delivery happens whether or not
    /// the completion is awaited.
    #[track_caller]
    pub fn dump<T: Inspect + ?Sized>(&self, value: &T, title: Option<&str>) -> Completion {
        self.dump_from(value, title, None, Location::caller())
    }

    pub(crate) fn dump_from<T: Inspect + ?Sized>(
        &self,
        value: &T,
        title: Option<&str>,
        accessor: Option<&str>,
        site: &Location<'_>,
    ) -> Completion {
        let node = canonicalize(value);

        if let Some(renderer) = &self.renderer {
            renderer.render_data(&node, title);
            return Completion::ready();
        }

        let config = self.config.read().clone();
        let source = self.source_label(&config, site, accessor);
        self.queue
            .submit(node, title.map(str::to_string), source, config.endpoint())
    }

    /// Dump a markup snippet, shown rendered by the viewer
    ///
    /// Fails immediately if `markup` is not valid UTF-8.
    pub fn dump_markup(&self, markup: impl AsRef<[u8]>, title: Option<&str>) -> Result<Completion> {
        let markup = markup.as_ref();

        if let Some(renderer) = &self.renderer {
            let markup =
                std::str::from_utf8(markup).map_err(|e| Error::InvalidMarkup(e.to_string()))?;
            renderer.render_markup(markup, title);
            return Ok(Completion::ready());
        }

        let endpoint = self.config.read().endpoint();
        self.queue
            .submit_markup(markup, title.map(str::to_string), endpoint)
    }

    /// Clear the viewer, dropping dumps that have not been sent yet
    pub fn clear(&self) -> Completion {
        if let Some(renderer) = &self.renderer {
            renderer.render_clear();
            return Completion::ready();
        }

        let endpoint = self.config.read().endpoint();
        self.queue.request_clear(endpoint)
    }

    /// Change settings; affects items queued afterwards
    pub fn configure(&self, update: impl FnOnce(&mut DumpConfig)) {
        let mut config = self.config.write();
        update(&mut config);
        self.queue.set_timeout(config.timeout());
    }

    pub fn config(&self) -> DumpConfig {
        self.config.read().clone()
    }

    /// Items waiting or in flight
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Wait until everything queued so far has settled
    pub async fn flush(&self) {
        self.queue.idle().await
    }

    /// Drain the queue and tear the dumper down
    pub async fn shutdown(self) {
        self.flush().await;
        tracing::debug!("dumper shut down");
    }

    fn source_label(
        &self,
        config: &DumpConfig,
        site: &Location<'_>,
        accessor: Option<&str>,
    ) -> Option<String> {
        if !config.source {
            return None;
        }

        match self
            .locator
            .line_of(site, accessor, config.source_root.as_deref())
        {
            Ok(line) => Some(match &config.source_format {
                Some(format) => format.apply(&line, accessor),
                None => line,
            }),
            Err(err) => {
                tracing::debug!(file = site.file(), line = site.line(), error = %err, "no source label");
                None
            }
        }
    }
}

/// Method name used by [`DumpExt::dump_with`]; stripped from source labels
const DUMP_ACCESSOR: &str = "dump_with";

/// Dump a value in method position, passing it through
///
/// ```no_run
/// use glimpse_fabric::{DumpConfig, DumpExt, Dumper};
///
/// # async fn example() -> glimpse_fabric::Result<()> {
/// let dumper = Dumper::http(DumpConfig::default())?;
/// let total: u32 = [1u32, 2, 3].dump_with(&dumper, None).iter().sum();
/// # Ok(())
/// # }
/// ```
pub trait DumpExt: Inspect {
    #[track_caller]
    fn dump_with(&self, dumper: &Dumper, title: Option<&str>) -> &Self {
        // Fire and forget; the item is already queued
        let _ = dumper.dump_from(self, title, Some(DUMP_ACCESSOR), Location::caller());
        self
    }
}

impl<T: Inspect + ?Sized> DumpExt for T {}
