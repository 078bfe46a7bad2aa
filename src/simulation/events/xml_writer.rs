use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

use flate2::Compression;
use flate2::write::GzEncoder;
use quick_xml::escape::escape;
use tracing::{error, info};

use crate::simulation::events::{Event, EventsManager};

const HEADER: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<events version=\"1.0\">\n";
const FOOTER: &str = "</events>";

/// Writes events in the matsim xml events format. If the file name ends with `.gz`, the output is
/// gzip compressed.
pub struct XmlEventsWriter {
    writer: RefCell<Option<Box<dyn Write>>>,
}

impl XmlEventsWriter {
    pub fn new(path: &Path) -> std::io::Result<Self> {
        info!("Creating file: {path:?}");
        let file = BufWriter::new(File::create(path)?);
        let is_gz = path.extension().is_some_and(|ext| ext == "gz");
        let writer: Box<dyn Write> = if is_gz {
            Box::new(GzEncoder::new(file, Compression::fast()))
        } else {
            Box::new(file)
        };
        Self::from_writer(writer)
    }

    pub fn from_writer(mut writer: Box<dyn Write>) -> std::io::Result<Self> {
        writer.write_all(HEADER.as_bytes())?;
        Ok(XmlEventsWriter {
            writer: RefCell::new(Some(writer)),
        })
    }

    pub fn event_2_string(event: &Event) -> String {
        let mut result = String::from("<event ");
        for (key, value) in event.attributes() {
            result.push_str(key);
            result.push_str("=\"");
            result.push_str(&escape(value.as_str()));
            result.push_str("\" ");
        }
        result.push_str("/>\n");
        result
    }

    pub fn on_event(&self, event: &Event) -> std::io::Result<()> {
        let mut writer = self.writer.borrow_mut();
        match writer.as_mut() {
            Some(w) => w.write_all(Self::event_2_string(event).as_bytes()),
            None => Err(std::io::Error::other("events file was already closed")),
        }
    }

    /// Writes the closing tag and closes the file. Further events are rejected.
    pub fn finish(&self) -> std::io::Result<()> {
        info!("Finishing events file.");
        if let Some(mut writer) = self.writer.borrow_mut().take() {
            writer.write_all(FOOTER.as_bytes())?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Creates a writer for `path` and subscribes it to all events of the manager. Write errors are
    /// reported through the manager's failure channel.
    pub fn register(path: &Path, events: &mut EventsManager) -> std::io::Result<()> {
        let xml = Rc::new(XmlEventsWriter::new(path)?);
        let on_event = xml.clone();
        events.on_any_fallible(move |e| on_event.on_event(e));
        events.on_finish(move || {
            if let Err(e) = xml.finish() {
                error!("Failed to finish events file: {e}");
            }
        });
        Ok(())
    }
}
