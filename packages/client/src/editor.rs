//! Editor capability interface.
//!
//! The relay only ever exchanges whole-buffer text, so an editor has to be
//! able to replace its content from the network and report local changes.

/// Callback invoked with the full buffer after a local change
pub type ChangeCallback = Box<dyn FnMut(String) + Send>;

/// What the client needs from an editor.
pub trait ContentEditor {
    /// Current buffer
    fn content(&self) -> &str;

    /// Replace the buffer with text received from the room.
    ///
    /// Must not be reported back through the change callback.
    fn apply_remote_content(&mut self, text: &str);

    /// Register the callback for local changes
    fn on_local_content_changed(&mut self, callback: ChangeCallback);
}

/// Suppresses echoes of remote content.
///
/// A change is emitted only when it was not caused by applying remote
/// content and differs from the last content seen.
#[derive(Debug, Default)]
pub struct EchoGuard {
    applying_remote: bool,
    last_seen: Option<String>,
}

impl EchoGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of applying remote content
    pub fn begin_remote(&mut self, text: &str) {
        self.applying_remote = true;
        self.last_seen = Some(text.to_string());
    }

    pub fn end_remote(&mut self) {
        self.applying_remote = false;
    }

    /// Whether a change to `text` should be sent to the room
    pub fn should_emit(&mut self, text: &str) -> bool {
        if self.applying_remote || self.last_seen.as_deref() == Some(text) {
            return false;
        }
        self.last_seen = Some(text.to_string());
        true
    }
}

/// Plain text buffer edited line by line (used by the CLI)
#[derive(Default)]
pub struct LineBufferEditor {
    text: String,
    guard: EchoGuard,
    callback: Option<ChangeCallback>,
}

impl LineBufferEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line to the buffer
    pub fn append_line(&mut self, line: &str) {
        let mut text = self.text.clone();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(line);
        self.set_content(text);
    }

    /// Replace the whole buffer with a local edit
    pub fn set_content(&mut self, text: String) {
        self.text = text;
        self.content_changed();
    }

    fn content_changed(&mut self) {
        if !self.guard.should_emit(&self.text) {
            return;
        }
        if let Some(callback) = self.callback.as_mut() {
            callback(self.text.clone());
        }
    }
}

impl ContentEditor for LineBufferEditor {
    fn content(&self) -> &str {
        &self.text
    }

    fn apply_remote_content(&mut self, text: &str) {
        self.guard.begin_remote(text);
        self.text = text.to_string();
        self.content_changed();
        self.guard.end_remote();
    }

    fn on_local_content_changed(&mut self, callback: ChangeCallback) {
        self.callback = Some(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_editor() -> (LineBufferEditor, Arc<Mutex<Vec<String>>>) {
        let emitted = Arc::new(Mutex::new(Vec::new()));
        let sink = emitted.clone();
        let mut editor = LineBufferEditor::new();
        editor.on_local_content_changed(Box::new(move |text| sink.lock().unwrap().push(text)));
        (editor, emitted)
    }

    #[test]
    fn test_local_edits_are_emitted() {
        // テスト項目: ローカルの編集はバッファ全体として通知される
        // given (前提条件):
        let (mut editor, emitted) = recording_editor();

        // when (操作):
        editor.append_line("a");
        editor.append_line("b");

        // then (期待する結果):
        assert_eq!(editor.content(), "a\nb");
        assert_eq!(*emitted.lock().unwrap(), vec!["a", "a\nb"]);
    }

    #[test]
    fn test_remote_content_is_not_echoed() {
        // テスト項目: リモートから適用した内容は通知されない
        // given (前提条件):
        let (mut editor, emitted) = recording_editor();

        // when (操作):
        editor.apply_remote_content("print(2)");

        // then (期待する結果):
        assert_eq!(editor.content(), "print(2)");
        assert!(emitted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unchanged_content_is_not_emitted() {
        // テスト項目: 直前と同じ内容への変更は通知されない
        // given (前提条件):
        let (mut editor, emitted) = recording_editor();
        editor.apply_remote_content("x");

        // when (操作):
        editor.set_content("x".to_string());
        editor.set_content("y".to_string());

        // then (期待する結果):
        assert_eq!(*emitted.lock().unwrap(), vec!["y"]);
    }
}
