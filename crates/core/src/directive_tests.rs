use super::*;
use serde_json::json;

#[test]
fn tag_names_cover_every_variant() {
    let d = Directive::Message { text: "hi".into() };
    assert_eq!(d.name(), "wa_message");
    assert_eq!(d.to_tag(), "<wa_message>hi</wa_message>");
}

#[test]
fn followup_renders_optional_goal() {
    let with = Directive::Followup {
        topic: "finish m2".into(),
        goal_id: Some("g1".into()),
    };
    let without = Directive::Followup {
        topic: "finish m2".into(),
        goal_id: None,
    };
    assert_eq!(with.to_tag(), "<followup goal=\"g1\">finish m2</followup>");
    assert_eq!(without.to_tag(), "<followup>finish m2</followup>");
}

#[test]
fn goal_update_renders_attrs_in_fixed_order() {
    let d = Directive::GoalUpdate {
        id: "g1".into(),
        status: Some(crate::goal::GoalStatus::Blocked),
        progress: Some(40),
        note: "waiting on review".into(),
    };
    assert_eq!(
        d.to_tag(),
        "<goal_update id=\"g1\" status=\"blocked\" progress=\"40\">waiting on review</goal_update>"
    );
}

#[test]
fn attribute_values_are_escaped() {
    let d = Directive::GoalCreate {
        title: "fix \"quoted\" & co".into(),
        description: "desc".into(),
    };
    assert_eq!(
        d.to_tag(),
        "<goal_create title=\"fix &quot;quoted&quot; &amp; co\">desc</goal_create>"
    );
    assert_eq!(attr_unescape("fix &quot;q&quot; &amp; co"), "fix \"q\" & co");
}

#[test]
fn malformed_body_renders_raw() {
    let d = Directive::ToolCall {
        name: "t".into(),
        params: JsonBody::Malformed {
            raw: "{not json".into(),
        },
    };
    assert_eq!(d.to_tag(), "<tool_call name=\"t\">{not json</tool_call>");
    assert!(matches!(&d, Directive::ToolCall { params, .. } if params.is_malformed()));
}

#[test]
fn json_body_renders_compact_json() {
    let d = Directive::ToolCall {
        name: "t".into(),
        params: JsonBody::Json(json!({"a": "b"})),
    };
    assert_eq!(d.to_tag(), "<tool_call name=\"t\">{\"a\":\"b\"}</tool_call>");
}

#[test]
fn mutating_classification() {
    assert!(!Directive::Message { text: "x".into() }.is_mutating());
    assert!(!Directive::ActionTaken { text: "x".into() }.is_mutating());
    assert!(Directive::GoalCreate {
        title: "t".into(),
        description: "d".into()
    }
    .is_mutating());
    assert!(Directive::ToolCall {
        name: "t".into(),
        params: JsonBody::Json(json!({}))
    }
    .is_mutating());
}

#[test]
fn canonical_list_is_one_tag_per_line() {
    let list = vec![
        Directive::ActionTaken { text: "did x".into() },
        Directive::NextCycleMinutes { minutes: 30 },
    ];
    assert_eq!(
        to_canonical(&list),
        "<action_taken>did x</action_taken>\n<next_cycle_minutes>30</next_cycle_minutes>\n"
    );
}

#[test]
fn directive_serde_round_trip() {
    let list = vec![
        Directive::MilestoneComplete {
            goal_id: "g1".into(),
            milestone_id: "m2".into(),
            evidence: "tests pass".into(),
        },
        Directive::ChainPlan {
            plan: JsonBody::Json(json!({"steps": ["a", "b"]})),
        },
    ];
    let text = serde_json::to_string(&list).unwrap();
    let back: Vec<Directive> = serde_json::from_str(&text).unwrap();
    assert_eq!(back, list);
}
