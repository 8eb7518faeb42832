use std::io::{Read as _, Write as _};
use std::path::Path;
use std::process::Command;

const MAIN_XML: &str = r#"<Document SchemaVersion="4">
    <ObjectData>
        <Object name="Spreadsheet">
            <Properties Count="1">
                <Property name="cells" type="Spreadsheet::PropertySheet" status="67108864">
                    <Cells Count="2" xlink="0">
                        <Cell address="B1" content="5" alias="Value"/>
                        <Cell address="C1" content="=Value * 2"/>
                    </Cells>
                </Property>
            </Properties>
        </Object>
    </ObjectData>
</Document>"#;

const PART_XML: &str = r#"<Document SchemaVersion="4">
    <ObjectData>
        <Object name="Cylinder">
            <Properties Count="1">
                <Property name="ExpressionEngine" type="App::PropertyExpressionEngine" status="67108864">
                    <ExpressionEngine count="1" xlink="1">
                        <XLinks count="1" docs="1">
                            <DocMap name="Main" label="Main" index="0"/>
                            <XLink file="Main.FCStd" stamp="2021-07-25T18:40:15Z" name="Spreadsheet"/>
                        </XLinks>
                        <Expression path="Radius" expression="Main#Spreadsheet.Value"/>
                    </ExpressionEngine>
                </Property>
            </Properties>
        </Object>
    </ObjectData>
</Document>"#;

fn fcx_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_fcx"));
    cmd.current_dir(dir);
    cmd
}

fn read_member(path: &Path, member: &str) -> Vec<u8> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut bytes = Vec::new();
    archive.by_name(member).unwrap().read_to_end(&mut bytes).unwrap();
    bytes
}

fn write_archive(path: &Path, xml: &str, extra: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("Document.xml", options).unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    for (name, bytes) in extra {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
}

fn write_forest(dir: &Path) {
    write_archive(&dir.join("Main.FCStd"), MAIN_XML, &[("GuiDocument.xml", b"<gui/>")]);
    write_archive(&dir.join("Part.FCStd"), PART_XML, &[]);
}

#[test]
fn find_reports_direct_and_indirect_references() {
    let dir = tempfile::tempdir().unwrap();
    write_forest(dir.path());

    let output = fcx_cmd(dir.path())
        .args(["find", "Main", "Spreadsheet", "Value"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "find failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Part Cylinder.Radius expression direct"), "stdout: {stdout}");
    assert!(stdout.contains("Main Spreadsheet.C1 content indirect"), "stdout: {stdout}");
}

#[test]
fn find_with_no_matches_reports_and_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    write_forest(dir.path());

    let output = fcx_cmd(dir.path())
        .args(["find", "Main", "Spreadsheet", "Nothing"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No references to Main#Spreadsheet.Nothing found."));
}

#[test]
fn rename_rewrites_documents_and_preserves_other_members() {
    let dir = tempfile::tempdir().unwrap();
    write_forest(dir.path());

    let output = fcx_cmd(dir.path())
        .args(["rename", "Main", "Spreadsheet", "Value", "Amount", "--yes"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "rename failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 document(s) updated."), "stdout: {stdout}");

    let part_xml = read_member(&dir.path().join("Part.FCStd"), "Document.xml");
    let part_xml = String::from_utf8(part_xml).unwrap();
    assert!(part_xml.contains(r#"expression="Main#Spreadsheet.Amount""#));

    let main_xml = read_member(&dir.path().join("Main.FCStd"), "Document.xml");
    let main_xml = String::from_utf8(main_xml).unwrap();
    assert!(main_xml.contains(r#"alias="Amount""#));
    assert!(main_xml.contains(r#"content="=Amount * 2""#));

    // The untouched archive member survives byte-for-byte.
    assert_eq!(read_member(&dir.path().join("Main.FCStd"), "GuiDocument.xml"), b"<gui/>");
}

#[test]
fn remove_compacts_link_tables() {
    let dir = tempfile::tempdir().unwrap();
    write_forest(dir.path());

    let output = fcx_cmd(dir.path())
        .args(["remove", "Main", "--yes"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "remove failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 document(s) updated."), "stdout: {stdout}");

    let part_xml = read_member(&dir.path().join("Part.FCStd"), "Document.xml");
    let part_xml = String::from_utf8(part_xml).unwrap();
    // The expression container loses its link marker and its whole table.
    assert!(!part_xml.contains("XLinks"));
    assert!(!part_xml.contains(r#"xlink="1""#));
    // The expression text itself is not the remove command's business.
    assert!(part_xml.contains(r#"expression="Main#Spreadsheet.Value""#));
}
