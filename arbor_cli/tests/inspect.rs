mod common;

use arbor_core::AnyEmptyResult;
use serde_json::Value;

#[test]
fn text_tree_outlines_the_template() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let template = tmp.path().join("page.tpl");
	std::fs::write(
		&template,
		"Hi {name}!\n[if plan == \"pro\"]*[/if]\n[section footer]bye[/section]",
	)?;

	let mut cmd = common::arbor_cmd();
	let assert = cmd
		.arg("inspect")
		.arg(&template)
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();
	let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();

	insta::assert_snapshot!(stdout, @r#"
	template `page` (classic, 9 nodes)
	  text "Hi " at 1:1
	  variable name at 1:4
	  text "!\n" at 1:10
	  condition plan == "pro" at 2:1
	    text "*" at 2:19
	  text "\n" at 2:25
	  section `footer` at 3:1
	    text "bye" at 3:17
	"#);

	Ok(())
}

#[test]
fn handlebars_templates_outline_with_the_dialect_flag() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let template = tmp.path().join("page.tpl");
	std::fs::write(&template, "Hi {{name}}!")?;

	let mut cmd = common::arbor_cmd();
	let assert = cmd
		.arg("inspect")
		.arg(&template)
		.arg("--dialect")
		.arg("handlebars")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();
	let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();

	insta::assert_snapshot!(stdout, @r#"
	template `page` (handlebars, 4 nodes)
	  text "Hi " at 1:1
	  variable name at 1:4
	  text "!" at 1:12
	"#);

	Ok(())
}

#[test]
fn json_report_includes_the_node_tree() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let template = tmp.path().join("page.tpl");
	std::fs::write(&template, "Hi {name}")?;

	let mut cmd = common::arbor_cmd();
	let output = cmd
		.arg("inspect")
		.arg(&template)
		.arg("--format")
		.arg("json")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.get_output()
		.stdout
		.clone();

	let report: Value = serde_json::from_slice(&output)?;
	assert_eq!(report["name"], Value::String("page".into()));
	assert_eq!(report["dialect"], Value::String("classic".into()));
	assert_eq!(report["nodes"], Value::from(3));

	let nodes = report["template"]["nodes"]
		.as_array()
		.unwrap_or_else(|| panic!("expected a nodes array in the report"));
	assert_eq!(nodes.len(), 3);
	assert_eq!(nodes[0]["kind"]["block"]["scope"]["children"], serde_json::json!([1, 2]));
	assert_eq!(nodes[1]["kind"]["text"]["content"], Value::String("Hi ".into()));
	assert_eq!(nodes[2]["kind"]["variable"]["name"], Value::String("name".into()));
	assert_eq!(nodes[2]["parent"], Value::from(0));

	let source_path = report["template"]["source_path"]
		.as_str()
		.unwrap_or_else(|| panic!("expected a source path in the report"));
	assert!(source_path.ends_with("page.tpl"));

	Ok(())
}

#[test]
fn inspect_rejects_malformed_templates() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let template = tmp.path().join("page.tpl");
	std::fs::write(&template, "[section footer]dangling")?;

	let mut cmd = common::arbor_cmd();
	cmd.arg("inspect")
		.arg(&template)
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.failure()
		.code(2)
		.stderr(predicates::str::contains("unclosed section block"));

	Ok(())
}
