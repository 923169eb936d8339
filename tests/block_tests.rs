use std::io::Cursor;
use tocsv::{
    validate, LineSource, MergedLines, Pipeline, PipelineConfig, ReaderLineSource, RunOutput,
    ToolConfig,
};

const SESSIONS: &str = r#"
PrintTagInOutput: true
Apps:
  - AppName: Audit
    LogLines:
      - Tag: AUDIT
        Patterns: ["audit"]
        ExampleLine: "10:00:00 audit who=root;"
        Elements:
          WhoKey:
            ColumnName: who
            StartPattern: "who="
            EndPattern: ";"
  - AppName: Sessions
    StartBlockPattern: ["session start"]
    EndBlockPattern: ["session end"]
    BlockStartPolicy: POLICY
    LogLines:
      - Tag: START
        Patterns: ["session start"]
        ExampleLine: "10:00:00 session start user=ann;"
        Elements:
          UserKey:
            ColumnName: user
            StartPattern: "user="
            EndPattern: ";"
      - Tag: ACTION
        Patterns: ["action"]
        ExampleLine: "10:00:01 action name=login;"
        Elements:
          ActionKey:
            ColumnName: action
            StartPattern: "name="
            EndPattern: ";"
      - Tag: END
        Patterns: ["session end"]
        ExampleLine: "10:00:02 session end status=ok;"
        Elements:
          StatusKey:
            ColumnName: status
            StartPattern: "status="
            EndPattern: ";"
"#;

fn run(policy: &str, input: &str) -> RunOutput {
    let config = ToolConfig::from_yaml_str(&SESSIONS.replace("POLICY", policy)).unwrap();
    let rules = validate(&config).unwrap();
    let sources: Vec<Box<dyn LineSource>> = vec![Box::new(ReaderLineSource::new(
        "sessions.log",
        Cursor::new(input.to_string()),
    ))];

    let mut pipeline = Pipeline::new(
        &rules,
        PipelineConfig {
            print_tag_in_output: config.print_tag_in_output,
            ..Default::default()
        },
    );
    pipeline.run(MergedLines::new(sources)).unwrap()
}

fn session_rows(output: &RunOutput) -> Vec<Vec<String>> {
    output
        .tables
        .iter()
        .find(|t| t.name == "Sessions")
        .map(|t| t.rows.clone())
        .unwrap_or_default()
}

#[test]
fn test_fields_accumulate_until_block_end() {
    let input = "\
10:00:00 session start user=ann;
10:00:01 action name=login;
10:00:02 session end status=ok;
10:01:00 session start user=bob;
10:01:02 session end status=denied;
";
    let output = run("reset", input);

    assert_eq!(
        output.tables[0].header,
        vec!["__tag__", "user", "action", "status"]
    );
    assert_eq!(
        session_rows(&output),
        vec![
            vec!["END", "ann", "login", "ok"],
            vec!["END", "bob", "N/A", "denied"],
        ]
    );
    assert_eq!(output.stats.records_emitted, 2);
}

#[test]
fn test_reset_policy_drops_interrupted_block() {
    let input = "\
10:00:00 session start user=ann;
10:00:01 action name=login;
10:00:02 session start user=bob;
10:00:03 session end status=ok;
";
    let output = run("reset", input);

    assert_eq!(session_rows(&output), vec![vec!["END", "bob", "N/A", "ok"]]);
    assert_eq!(output.stats.blocks_discarded, 1);
}

#[test]
fn test_carry_policy_keeps_interrupted_block() {
    let input = "\
10:00:00 session start user=ann;
10:00:01 action name=login;
10:00:02 session start user=bob;
10:00:03 session end status=ok;
";
    let output = run("carry", input);

    assert_eq!(
        session_rows(&output),
        vec![vec!["END", "bob", "login", "ok"]]
    );
    assert_eq!(output.stats.blocks_discarded, 0);
}

#[test]
fn test_other_groups_do_not_touch_blocks() {
    // The audit line mentions "session end" but is claimed by Audit, declared first
    let input = "\
10:00:00 session start user=ann;
10:00:01 audit who=root; session end
10:00:02 action name=login;
10:00:03 session end status=ok;
";
    let output = run("reset", input);

    assert_eq!(output.tables.len(), 2);
    assert_eq!(output.tables[0].name, "Audit");
    assert_eq!(output.tables[0].rows, vec![vec!["AUDIT", "root"]]);
    assert_eq!(
        session_rows(&output),
        vec![vec!["END", "ann", "login", "ok"]]
    );
}

#[test]
fn test_block_open_at_end_of_input_is_dropped() {
    let input = "\
10:00:00 session start user=ann;
10:00:01 session end status=ok;
10:00:02 session start user=bob;
10:00:03 action name=logout;
";
    let output = run("carry", input);

    assert_eq!(session_rows(&output), vec![vec!["END", "ann", "N/A", "ok"]]);
    assert_eq!(output.stats.unterminated_blocks, 1);
}

#[test]
fn test_single_marker_set_runs_stateless() {
    let yaml = SESSIONS
        .replace("POLICY", "reset")
        .replace("    EndBlockPattern: [\"session end\"]\n", "");
    let config = ToolConfig::from_yaml_str(&yaml).unwrap();
    let rules = validate(&config).unwrap();
    assert!(rules.groups()[1].block.is_none());

    let sources: Vec<Box<dyn LineSource>> = vec![Box::new(ReaderLineSource::new(
        "sessions.log",
        Cursor::new("10:00:00 session start user=ann;\n10:00:01 action name=login;\n"),
    ))];
    let mut pipeline = Pipeline::new(&rules, PipelineConfig::default());
    let output = pipeline.run(MergedLines::new(sources)).unwrap();

    assert_eq!(
        output.tables[0].rows,
        vec![vec!["ann", "N/A", "N/A"], vec!["N/A", "login", "N/A"]]
    );
}

#[test]
fn test_block_config_rejects_repeated_keys() {
    let yaml = SESSIONS
        .replace("POLICY", "reset")
        .replace("StatusKey:", "UserKey:");
    let config = ToolConfig::from_yaml_str(&yaml).unwrap();
    let err = validate(&config).unwrap_err();

    let message = err.to_string();
    assert!(message.contains("group 'Sessions'"), "{}", message);
    assert!(message.contains("rule 'END'"), "{}", message);
    assert!(message.contains("element 'UserKey'"), "{}", message);
}
