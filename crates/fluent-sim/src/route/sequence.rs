//! Ordered responses of a route.
//!
//! Each match consumes the response under the cursor and advances it. Once the
//! last response is reached it keeps being served.

use crate::response::ResponseDefinition;

#[derive(Debug, Clone)]
pub struct ResponseSequence {
    responses: Vec<ResponseDefinition>,
    cursor: usize,
}

impl Default for ResponseSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSequence {
    /// A sequence holding a single default response.
    pub fn new() -> Self {
        Self {
            responses: vec![ResponseDefinition::new()],
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The response that configuration calls currently edit.
    pub fn current_mut(&mut self) -> &mut ResponseDefinition {
        if self.responses.is_empty() {
            self.responses.push(ResponseDefinition::new());
        }
        let last = self.responses.len() - 1;
        &mut self.responses[last]
    }

    /// Append a fresh default response; it becomes the one being edited.
    pub fn push(&mut self) {
        self.responses.push(ResponseDefinition::new());
    }

    /// Return the response under the cursor and advance, staying on the last one.
    pub fn next_response(&mut self) -> ResponseDefinition {
        let last = self.responses.len().saturating_sub(1);
        let index = self.cursor.min(last);
        let response = self.responses.get(index).cloned().unwrap_or_default();
        self.cursor = (index + 1).min(last);
        response
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}
