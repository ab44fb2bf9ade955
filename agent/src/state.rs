// Copyright 2019-2021 Parity Technologies (UK) Ltd.
//
// Permission is hereby granted, free of charge, to any
// person obtaining a copy of this software and associated
// documentation files (the "Software"), to deal in the
// Software without restriction, including without
// limitation the rights to use, copy, modify, merge,
// publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software
// is furnished to do so, subject to the following
// conditions:
//
// The above copyright notice and this permission notice
// shall be included in all copies or substantial portions
// of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF
// ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED
// TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A
// PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT
// SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY
// CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR
// IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

/// The connection state machine.
///
/// ```text
/// INIT -> CLEANING -> CONNECTING -> CONNECTED <-> RECONNECTING
///                                      |
///                                      v
///                                   ENDING -> ENDED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Init,
    Cleaning,
    Connecting,
    Connected,
    Reconnecting,
    Ending,
    Ended,
}

/// Events surfaced externally as the connection progresses.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    Connect,
    Reconnect,
    Close,
    Offline,
    Error(String),
    End,
}

impl AgentState {
    /// True if `next` is a legal transition from `self`. Kept permissive on
    /// `Connected <-> Reconnecting` since a flaky broker can bounce between
    /// the two arbitrarily many times.
    pub fn can_transition_to(self, next: AgentState) -> bool {
        use AgentState::*;
        matches!(
            (self, next),
            (Init, Cleaning)
                | (Cleaning, Connecting)
                | (Connecting, Connected)
                | (Connected, Reconnecting)
                | (Reconnecting, Connected)
                | (Connected, Ending)
                | (Reconnecting, Ending)
                | (Connecting, Ending)
                | (Ending, Ended)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AgentState::*;

    #[test]
    fn follows_the_documented_diagram() {
        assert!(Init.can_transition_to(Cleaning));
        assert!(Cleaning.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Reconnecting));
        assert!(Reconnecting.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Ending));
        assert!(Ending.can_transition_to(Ended));
    }

    #[test]
    fn rejects_skipping_cleanup() {
        assert!(!Init.can_transition_to(Connected));
        assert!(!Ended.can_transition_to(Connecting));
    }
}
