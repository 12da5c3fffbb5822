/// Canned example questions shown on the empty state. Selecting one submits
/// its `value` exactly as if the user had typed it.

pub struct ExamplePrompt {
    /// Text shown in the list.
    pub text: &'static str,
    /// Question actually submitted.
    pub value: &'static str,
}

pub const EXAMPLES: &[ExamplePrompt] = &[
    ExamplePrompt {
        text: "What is the maximum speed offered for the 20GB Data Plan?",
        value: "What is the maximum speed offered for the 20GB Data Plan?",
    },
    ExamplePrompt {
        text: "What is the monthly pricing for the 21Mbps 20GB Data Plan?",
        value: "What is the monthly pricing for the 21Mbps 20GB Data Plan?",
    },
    ExamplePrompt {
        text: "How can customers subscribe to the 'care free all you can talk' service?",
        value: "How can customers subscribe to the 'care free all you can talk' service?",
    },
];
