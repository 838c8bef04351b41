/// Warnings accumulated over one optimization call.
///
/// Every message is also emitted through `log::warn!` when pushed.
#[derive(Debug, Default)]
pub(crate) struct Warnings {
    messages: Vec<String>,
}

impl Warnings {
    pub(crate) fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.messages.push(message);
    }

    #[cfg(test)]
    pub(crate) fn messages(&self) -> &[String] {
        &self.messages
    }

    pub(crate) fn into_vec(self) -> Vec<String> {
        self.messages
    }
}
