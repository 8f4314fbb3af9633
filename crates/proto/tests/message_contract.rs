use proto::{ChatMessage, Role};

#[test]
fn conversation_serializes_in_chat_completion_shape() {
    let history = vec![
        ChatMessage::system("you're a helpful assistant"),
        ChatMessage::user("Hello"),
        ChatMessage::assistant("Hi there!"),
    ];

    let value = serde_json::to_value(&history).expect("serialize history");
    let roles: Vec<&str> = value
        .as_array()
        .expect("array")
        .iter()
        .map(|m| m["role"].as_str().expect("role string"))
        .collect();
    assert_eq!(roles, ["system", "user", "assistant"]);

    let parsed: Vec<ChatMessage> = serde_json::from_value(value).expect("deserialize history");
    assert_eq!(parsed[2].role, Role::Assistant);
    assert_eq!(parsed, history);
}

#[test]
fn unknown_role_is_rejected_on_deserialize() {
    let raw = r#"{"role":"tool","content":"x"}"#;
    assert!(serde_json::from_str::<ChatMessage>(raw).is_err());
}
