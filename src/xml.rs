//! Streaming XML serializer.
//!
//! [`XmlWriter`] writes markup straight to its sink without building a
//! document tree. It is a small state machine:
//!
//! ```text
//! Start --start_write--> OpenElement <--> ClosedElement --(root closed)--> Finish
//! ```
//!
//! An element's opening tag is left unterminated (`<name`) while the writer
//! is in `OpenElement` so attributes can still be appended. Opening a child
//! terminates the parent tag with `>`; closing an element that never got a
//! child emits `/>`, otherwise `</name>`.

use std::io::Write;

use crate::error::{PackError, PackResult};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="true"?>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlState {
    Start,
    OpenElement,
    ClosedElement,
    Finish,
}

pub struct XmlWriter<W: Write> {
    sink: W,
    elements: Vec<String>,
    state: XmlState,
}

impl XmlWriter<Vec<u8>> {
    /// Writer backed by an in-memory buffer.
    pub fn in_memory() -> Self {
        Self::new(Vec::new())
    }
}

impl<W: Write> XmlWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            elements: Vec::new(),
            state: XmlState::Start,
        }
    }

    pub fn state(&self) -> XmlState {
        self.state
    }

    /// Emit the XML declaration and open the root element.
    pub fn start_write(&mut self, root: &str) -> PackResult<()> {
        if self.state != XmlState::Start {
            return Err(PackError::XmlError(
                "Invalid call, xml document already started".to_string(),
            ));
        }
        self.write(XML_DECLARATION)?;
        self.write("<")?;
        self.write(root)?;
        self.elements.push(root.to_string());
        self.state = XmlState::OpenElement;
        Ok(())
    }

    pub fn start_element(&mut self, name: &str) -> PackResult<()> {
        match self.state {
            XmlState::Finish => {
                return Err(PackError::XmlError(
                    "Invalid call, xml already finished".to_string(),
                ));
            }
            XmlState::Start => {
                return Err(PackError::XmlError(
                    "Invalid call, xml document not started".to_string(),
                ));
            }
            // Parent tag is still waiting for attributes; terminate it.
            XmlState::OpenElement => self.write(">")?,
            XmlState::ClosedElement => {}
        }
        self.write("<")?;
        self.write(name)?;
        self.elements.push(name.to_string());
        self.state = XmlState::OpenElement;
        Ok(())
    }

    pub fn add_attribute(&mut self, name: &str, value: &str) -> PackResult<()> {
        if self.state != XmlState::OpenElement {
            return Err(PackError::XmlError(
                "Invalid call to add_attribute".to_string(),
            ));
        }
        self.write(" ")?;
        self.write(name)?;
        self.write("=\"")?;
        self.write(&escape_attribute(value))?;
        self.write("\"")
    }

    pub fn close_element(&mut self) -> PackResult<()> {
        let name = match self.state {
            XmlState::Finish | XmlState::Start => {
                return Err(PackError::XmlError(
                    "Invalid call, no element is open".to_string(),
                ));
            }
            _ => self
                .elements
                .pop()
                .ok_or_else(|| PackError::XmlError("Element stack is empty".to_string()))?,
        };

        if self.state == XmlState::OpenElement {
            self.write("/>")?;
        } else {
            self.write("</")?;
            self.write(&name)?;
            self.write(">")?;
        }

        self.state = if self.elements.is_empty() {
            XmlState::Finish
        } else {
            XmlState::ClosedElement
        };
        Ok(())
    }

    /// Hand back the sink. Only valid once the root element has been closed.
    pub fn finish(self) -> PackResult<W> {
        if self.state != XmlState::Finish {
            return Err(PackError::XmlError(
                "Invalid call, the document is not complete".to_string(),
            ));
        }
        Ok(self.sink)
    }

    fn write(&mut self, text: &str) -> PackResult<()> {
        self.sink.write_all(text.as_bytes())?;
        Ok(())
    }
}

fn escape_attribute(value: &str) -> std::borrow::Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"']) {
        return std::borrow::Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    std::borrow::Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn render(writer: XmlWriter<Vec<u8>>) -> String {
        String::from_utf8(writer.finish().unwrap()).unwrap()
    }

    #[test]
    fn test_self_closing_child_and_root() {
        let mut xml = XmlWriter::in_memory();
        xml.start_write("Package").unwrap();
        xml.start_element("A").unwrap();
        xml.add_attribute("x", "1").unwrap();
        xml.close_element().unwrap();
        xml.close_element().unwrap();

        assert_eq!(
            render(xml),
            r#"<?xml version="1.0" encoding="UTF-8" standalone="true"?><Package><A x="1"/></Package>"#
        );
    }

    #[test]
    fn test_empty_root_self_closes() {
        let mut xml = XmlWriter::in_memory();
        xml.start_write("Types").unwrap();
        xml.add_attribute("xmlns", "urn:test").unwrap();
        xml.close_element().unwrap();

        assert_eq!(
            render(xml),
            r#"<?xml version="1.0" encoding="UTF-8" standalone="true"?><Types xmlns="urn:test"/>"#
        );
    }

    #[test]
    fn test_nested_elements() {
        let mut xml = XmlWriter::in_memory();
        xml.start_write("R").unwrap();
        xml.start_element("F").unwrap();
        xml.start_element("B").unwrap();
        xml.close_element().unwrap();
        xml.start_element("B").unwrap();
        xml.close_element().unwrap();
        xml.close_element().unwrap();
        assert_eq!(xml.state(), XmlState::ClosedElement);
        xml.close_element().unwrap();
        assert_eq!(xml.state(), XmlState::Finish);

        assert!(render(xml).ends_with("<R><F><B/><B/></F></R>"));
    }

    #[test]
    fn test_attribute_after_child_rejected() {
        let mut xml = XmlWriter::in_memory();
        xml.start_write("R").unwrap();
        xml.start_element("A").unwrap();
        xml.close_element().unwrap();

        let err = xml.add_attribute("late", "1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::XmlError);
    }

    #[test]
    fn test_calls_after_finish_rejected() {
        let mut xml = XmlWriter::in_memory();
        xml.start_write("R").unwrap();
        xml.close_element().unwrap();

        assert_eq!(xml.start_element("A").unwrap_err().kind(), ErrorKind::XmlError);
        assert_eq!(xml.close_element().unwrap_err().kind(), ErrorKind::XmlError);
        assert_eq!(
            xml.add_attribute("a", "b").unwrap_err().kind(),
            ErrorKind::XmlError
        );
    }

    #[test]
    fn test_element_before_start_rejected() {
        let mut xml = XmlWriter::in_memory();
        assert_eq!(xml.start_element("A").unwrap_err().kind(), ErrorKind::XmlError);
        assert_eq!(xml.close_element().unwrap_err().kind(), ErrorKind::XmlError);
    }

    #[test]
    fn test_finish_requires_closed_root() {
        let mut xml = XmlWriter::in_memory();
        xml.start_write("R").unwrap();
        assert!(xml.finish().is_err());
    }

    #[test]
    fn test_attribute_values_escaped() {
        let mut xml = XmlWriter::in_memory();
        xml.start_write("R").unwrap();
        xml.add_attribute("v", r#"a&b<"c">"#).unwrap();
        xml.close_element().unwrap();

        assert!(render(xml).ends_with(r#"<R v="a&amp;b&lt;&quot;c&quot;&gt;"/>"#));
    }
}
