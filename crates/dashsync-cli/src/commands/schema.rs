/// Print the settings JSON schema to stdout.
pub fn execute() {
    println!("{}", dashsync_config::generate_schema_json_pretty());
}
