//! Unit tests for the build hook lifecycle.

use super::*;
use crate::strip::MockCommandRunner;
use crate::test_utils::{StubDownloader, exit_status, output_with_status, sha256_hex, zip_bytes};
use rstest::{fixture, rstest};

const HEADERS_URL: &str = "https://frcmaven.wpi.edu/release/edu/wpi/first/wpiutil/wpiutil-cpp/2024.1.1/wpiutil-cpp-2024.1.1-headers.zip";
const LIBS_URL: &str = "https://example.com/ni-libs-linuxx86-64.zip";

const HEADERS_TARGET: &str = r#"
    [targets.wpiutil-headers]
    extract_to = "native/wpiutil"
    repo = "https://frcmaven.wpi.edu/release"
    group = "edu.wpi.first.wpiutil"
    artifact = "wpiutil-cpp"
    version = "2024.1.1"
    classifier = "headers"
    incdir = ""
"#;

const LIBS_TARGET: &str = r#"
    [targets.ni-libs]
    extract_to = "native/ni"
    url = "https://example.com/ni-libs-${OS}${ARCH}.zip"
    libdir = "${OS}${ARCH}/shared"
    libs = ["nilibs"]
"#;

struct Project {
    _dir: tempfile::TempDir,
    root: Utf8PathBuf,
}

#[fixture]
fn project() -> Project {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 path");
    Project { _dir: dir, root }
}

fn headers_zip() -> Vec<u8> {
    zip_bytes(&[
        ("wpi/util.h", b"#pragma once\n".as_slice()),
        ("wpi/detail/impl.h", b"// impl\n".as_slice()),
    ])
}

fn libs_zip() -> Vec<u8> {
    zip_bytes(&[
        ("linuxx86-64/shared/libnilibs.so", b"ELF".as_slice()),
        ("linuxx86-64/shared/libother.so", b"ELF".as_slice()),
    ])
}

fn config(source: &str) -> HookConfig {
    let table: toml::Table = source.parse().expect("valid TOML");
    HookConfig::from_table(&table).expect("valid configuration")
}

fn context(root: &Utf8Path, platform: &str) -> HookContext {
    HookContext::new(root, Platform::by_name(platform).expect("known platform"))
}

fn no_strip() -> MockCommandRunner {
    let mut runner = MockCommandRunner::new();
    runner.expect_run().never();
    runner
}

struct Outcome {
    result: Result<()>,
    build_data: BuildData,
    stderr: String,
}

fn initialize(
    context: HookContext,
    config: HookConfig,
    downloader: &StubDownloader,
    runner: &MockCommandRunner,
    version: &str,
) -> Outcome {
    let services = HookServices {
        downloader,
        extractor: &ZipExtractor,
        runner,
    };
    let mut stderr = Vec::new();
    let mut build_data = BuildData::default();
    let result = DownloadHook::new(context, config, services, &mut stderr)
        .initialize(version, &mut build_data);
    Outcome {
        result,
        build_data,
        stderr: String::from_utf8(stderr).expect("utf-8 output"),
    }
}

#[rstest]
fn headers_are_extracted_into_include(project: Project) {
    let downloader = StubDownloader::new().serving(HEADERS_URL, headers_zip());

    let outcome = initialize(
        context(&project.root, "linux-x86_64"),
        config(HEADERS_TARGET),
        &downloader,
        &no_strip(),
        "standard",
    );

    outcome.result.expect("initialize");
    assert!(project.root.join("native/wpiutil/include/wpi/util.h").is_file());
    assert_eq!(
        outcome.build_data.artifacts,
        vec![
            "native/wpiutil/include/wpi/util.h".to_owned(),
            "native/wpiutil/include/wpi/detail/impl.h".to_owned(),
        ]
    );
    assert_eq!(outcome.build_data.pure_python, Some(false));
    assert_eq!(outcome.build_data.tag.as_deref(), Some("py3-none-linux_x86_64"));
    assert!(outcome.stderr.contains(&format!("Downloading {HEADERS_URL}")));
    assert!(outcome.stderr.contains("Extracting wpiutil-cpp-2024.1.1-headers.zip"));
    assert!(outcome.stderr.contains("- wpi/util.h => "));
}

#[rstest]
fn non_wheel_targets_do_nothing(project: Project) {
    let downloader = StubDownloader::new();
    let mut sdist = context(&project.root, "linux-x86_64");
    sdist.target_name = "sdist".to_owned();

    let outcome = initialize(sdist, config(HEADERS_TARGET), &downloader, &no_strip(), "standard");

    outcome.result.expect("initialize");
    assert!(downloader.requests().is_empty());
    assert_eq!(outcome.build_data, BuildData::default());
}

#[rstest]
fn persistent_cache_is_reused_across_builds(project: Project) {
    let downloader = StubDownloader::new().serving(HEADERS_URL, headers_zip());
    let mut ctx = context(&project.root, "linux-x86_64");
    ctx.cache = CacheSettings::Persistent(project.root.join("cache"));

    let first = initialize(ctx.clone(), config(HEADERS_TARGET), &downloader, &no_strip(), "standard");
    let second = initialize(ctx, config(HEADERS_TARGET), &downloader, &no_strip(), "standard");

    first.result.expect("first build");
    second.result.expect("second build");
    assert_eq!(downloader.requests(), vec![HEADERS_URL.to_owned()]);
    assert!(second.stderr.contains("-> already present in cache"));
    assert_eq!(first.build_data.artifacts, second.build_data.artifacts);
}

#[rstest]
fn ephemeral_cache_downloads_every_build(project: Project) {
    let downloader = StubDownloader::new().serving(HEADERS_URL, headers_zip());

    for _ in 0..2 {
        initialize(
            context(&project.root, "linux-x86_64"),
            config(HEADERS_TARGET),
            &downloader,
            &no_strip(),
            "standard",
        )
        .result
        .expect("build");
    }

    assert_eq!(downloader.requests().len(), 2);
}

#[rstest]
fn libraries_are_stripped_on_linux(project: Project) {
    let downloader = StubDownloader::new().serving(LIBS_URL, libs_zip());
    let expected = project.root.join("native/ni/lib/libnilibs.so").to_string();
    let mut runner = MockCommandRunner::new();
    runner
        .expect_run()
        .times(1)
        .returning(move |program, args| {
            assert_eq!(program, "strip");
            assert_eq!(args, [expected.clone()]);
            Ok(output_with_status(exit_status(0), ""))
        });

    let outcome = initialize(
        context(&project.root, "linux-x86_64"),
        config(LIBS_TARGET),
        &downloader,
        &runner,
        "standard",
    );

    outcome.result.expect("initialize");
    assert!(project.root.join("native/ni/lib/libnilibs.so").is_file());
    assert!(!project.root.join("native/ni/lib/libother.so").exists());
    assert_eq!(outcome.build_data.artifacts, vec!["native/ni/lib/libnilibs.so".to_owned()]);
    assert!(outcome.stderr.contains("+ strip "));
}

#[rstest]
#[case::explicit_off("standard", "strip = false")]
#[case::editable_build("editable", "")]
fn stripping_is_skipped(project: Project, #[case] version: &str, #[case] strip_line: &str) {
    let downloader = StubDownloader::new().serving(LIBS_URL, libs_zip());
    let source = format!("{LIBS_TARGET}{strip_line}\n");

    let outcome = initialize(
        context(&project.root, "linux-x86_64"),
        config(&source),
        &downloader,
        &no_strip(),
        version,
    );

    outcome.result.expect("initialize");
}

#[rstest]
fn windows_libraries_are_not_stripped(project: Project) {
    let url = "https://example.com/ni-libs-windowsx86-64.zip";
    let downloader = StubDownloader::new().serving(
        url,
        zip_bytes(&[
            ("windowsx86-64/shared/nilibs.dll", b"MZ".as_slice()),
            ("windowsx86-64/shared/nilibs.lib", b"!<arch>".as_slice()),
        ]),
    );

    let outcome = initialize(
        context(&project.root, "win-amd64"),
        config(LIBS_TARGET),
        &downloader,
        &no_strip(),
        "standard",
    );

    outcome.result.expect("initialize");
    assert_eq!(
        outcome.build_data.artifacts,
        vec![
            "native/ni/lib/nilibs.dll".to_owned(),
            "native/ni/lib/nilibs.lib".to_owned(),
        ]
    );
    assert_eq!(outcome.build_data.tag.as_deref(), Some("py3-none-win_amd64"));
}

#[rstest]
fn disabled_targets_are_skipped(project: Project) {
    let downloader = StubDownloader::new();
    let source = format!("{HEADERS_TARGET}enable_if = \"platform_machine == 'roborio'\"\n");

    let outcome = initialize(
        context(&project.root, "linux-x86_64"),
        config(&source),
        &downloader,
        &no_strip(),
        "standard",
    );

    outcome.result.expect("initialize");
    assert!(downloader.requests().is_empty());
    assert!(outcome.stderr.contains("wpiutil-headers skipped"));
}

#[rstest]
fn unresolvable_target_fails_before_any_download(project: Project) {
    let downloader = StubDownloader::new().serving(HEADERS_URL, headers_zip());
    let broken = r#"
        [targets.zz-broken]
        extract_to = "native/broken"
        repo = "https://example.com/maven"
        group = "g"
        artifact = "a"
        version = "1"
        classifier = "${OS} ${ARCH}"
    "#;

    let outcome = initialize(
        context(&project.root, "linux-x86_64"),
        config(&format!("{HEADERS_TARGET}{broken}")),
        &downloader,
        &no_strip(),
        "standard",
    );

    match outcome.result {
        Err(HookError::Target { target, stage, .. }) => {
            assert_eq!(target, "zz-broken");
            assert_eq!(stage, TargetStage::Resolve);
        }
        other => panic!("expected resolve failure, got {other:?}"),
    }
    assert!(downloader.requests().is_empty());
}

#[rstest]
fn download_failure_names_target_and_stage(project: Project) {
    let downloader = StubDownloader::new();

    let outcome = initialize(
        context(&project.root, "linux-x86_64"),
        config(HEADERS_TARGET),
        &downloader,
        &no_strip(),
        "standard",
    );

    match outcome.result {
        Err(HookError::Target { target, stage, .. }) => {
            assert_eq!(target, "wpiutil-headers");
            assert_eq!(stage, TargetStage::Fetch);
        }
        other => panic!("expected fetch failure, got {other:?}"),
    }
}

#[rstest]
fn checksum_mismatch_aborts_build(project: Project) {
    let url = "https://example.com/data.zip";
    let downloader = StubDownloader::new().serving(url, zip_bytes(&[("a.txt", b"a".as_slice())]));
    let source = format!(
        "[targets.data]\nextract_to = 'data'\nurl = '{url}'\nchecksum = '{}'\n",
        sha256_hex(b"something else")
    );

    let outcome = initialize(
        context(&project.root, "linux-x86_64"),
        config(&source),
        &downloader,
        &no_strip(),
        "standard",
    );

    assert!(matches!(
        outcome.result,
        Err(HookError::Target {
            stage: TargetStage::Fetch,
            ..
        })
    ));
    assert!(!project.root.join("data/a.txt").exists());
}

#[rstest]
fn missing_library_is_an_extract_failure(project: Project) {
    let downloader = StubDownloader::new().serving(
        LIBS_URL,
        zip_bytes(&[("linuxx86-64/shared/libother.so", b"ELF".as_slice())]),
    );

    let outcome = initialize(
        context(&project.root, "linux-x86_64"),
        config(LIBS_TARGET),
        &downloader,
        &no_strip(),
        "standard",
    );

    assert!(matches!(
        outcome.result,
        Err(HookError::Target {
            stage: TargetStage::Extract,
            ..
        })
    ));
}

#[rstest]
fn stale_outputs_are_removed_before_extracting(project: Project) {
    let stale = project.root.join("native/wpiutil/include/old.h");
    std::fs::create_dir_all(stale.parent().expect("parent")).expect("create include");
    std::fs::write(&stale, b"old").expect("write stale header");
    let downloader = StubDownloader::new().serving(HEADERS_URL, headers_zip());

    let outcome = initialize(
        context(&project.root, "linux-x86_64"),
        config(HEADERS_TARGET),
        &downloader,
        &no_strip(),
        "standard",
    );

    outcome.result.expect("initialize");
    assert!(!stale.exists());
    assert!(outcome.stderr.contains("Removing "));
}

#[rstest]
fn shared_output_directory_is_cleared_once(project: Project) {
    let other_url = "https://example.com/extra-headers.zip";
    let downloader = StubDownloader::new()
        .serving(HEADERS_URL, headers_zip())
        .serving(other_url, zip_bytes(&[("extra/extra.h", b"x".as_slice())]));
    let source = format!(
        "{HEADERS_TARGET}\n[targets.zz-extra]\nextract_to = 'native/wpiutil'\nurl = '{other_url}'\nincdir = ''\n"
    );

    let outcome = initialize(
        context(&project.root, "linux-x86_64"),
        config(&source),
        &downloader,
        &no_strip(),
        "standard",
    );

    outcome.result.expect("initialize");
    assert!(project.root.join("native/wpiutil/include/wpi/util.h").is_file());
    assert!(project.root.join("native/wpiutil/include/extra/extra.h").is_file());
}

#[rstest]
fn host_tag_is_preserved(project: Project) {
    let downloader = StubDownloader::new().serving(HEADERS_URL, headers_zip());
    let services = HookServices {
        downloader: &downloader,
        extractor: &ZipExtractor,
        runner: &SystemCommandRunner,
    };
    let mut stderr = Vec::new();
    let mut build_data = BuildData {
        tag: Some("py3-none-any".to_owned()),
        ..BuildData::default()
    };

    DownloadHook::new(
        context(&project.root, "linux-x86_64"),
        config(HEADERS_TARGET),
        services,
        &mut stderr,
    )
    .initialize("standard", &mut build_data)
    .expect("initialize");

    assert_eq!(build_data.tag.as_deref(), Some("py3-none-any"));
}

#[rstest]
fn clean_removes_output_directories(project: Project) {
    let include = project.root.join("native/wpiutil/include");
    let lib = project.root.join("native/ni/lib");
    for dir in [&include, &lib] {
        std::fs::create_dir_all(dir).expect("create output dir");
        std::fs::write(dir.join("file"), b"x").expect("write output");
    }
    let untouched = project.root.join("native/keep.txt");
    std::fs::write(&untouched, b"keep").expect("write file");

    let mut stderr = Vec::new();
    let mut hook = DownloadHook::new(
        context(&project.root, "linux-x86_64"),
        config(&format!("{HEADERS_TARGET}{LIBS_TARGET}")),
        HookServices::system(),
        &mut stderr,
    );
    hook.clean(&["standard".to_owned()]).expect("clean");
    hook.clean(&["standard".to_owned()]).expect("clean twice");

    assert!(!include.exists());
    assert!(!lib.exists());
    assert!(untouched.is_file());
}

#[rstest]
fn quiet_hook_writes_nothing(project: Project) {
    let downloader = StubDownloader::new().serving(HEADERS_URL, headers_zip());
    let mut ctx = context(&project.root, "linux-x86_64");
    ctx.quiet = true;

    let outcome = initialize(ctx, config(HEADERS_TARGET), &downloader, &no_strip(), "standard");

    outcome.result.expect("initialize");
    assert!(outcome.stderr.is_empty());
}

#[rstest]
fn whole_archive_target_keeps_existing_files(project: Project) {
    let url = "https://example.com/generated.zip";
    let init = project.root.join("src/pkg/__init__.py");
    std::fs::create_dir_all(init.parent().expect("parent")).expect("create package");
    std::fs::write(&init, b"# package\n").expect("write package");
    let downloader =
        StubDownloader::new().serving(url, zip_bytes(&[("version.py", b"v = 1\n".as_slice())]));
    let source = format!("[targets.generated]\nextract_to = 'src/pkg'\nurl = '{url}'\n");

    let outcome = initialize(
        context(&project.root, "linux-x86_64"),
        config(&source),
        &downloader,
        &no_strip(),
        "standard",
    );

    outcome.result.expect("initialize");
    assert_eq!(std::fs::read(&init).expect("read package"), b"# package\n");
    assert!(project.root.join("src/pkg/version.py").is_file());
    assert!(!outcome.stderr.contains("Removing "));
}

#[rstest]
fn whole_archive_target_keeps_earlier_target_output(project: Project) {
    let data_url = "https://example.com/data.zip";
    let downloader = StubDownloader::new()
        .serving(HEADERS_URL, headers_zip())
        .serving(data_url, zip_bytes(&[("data.txt", b"data".as_slice())]));
    let source = format!(
        "{HEADERS_TARGET}\n[targets.zz-data]\nextract_to = 'native/wpiutil'\nurl = '{data_url}'\n"
    );

    let outcome = initialize(
        context(&project.root, "linux-x86_64"),
        config(&source),
        &downloader,
        &no_strip(),
        "standard",
    );

    outcome.result.expect("initialize");
    assert!(project.root.join("native/wpiutil/include/wpi/util.h").is_file());
    assert!(project.root.join("native/wpiutil/data.txt").is_file());
    assert_eq!(
        outcome.build_data.artifacts,
        vec![
            "native/wpiutil/include/wpi/util.h".to_owned(),
            "native/wpiutil/include/wpi/detail/impl.h".to_owned(),
            "native/wpiutil/data.txt".to_owned(),
        ]
    );
}

#[rstest]
fn clean_leaves_whole_archive_destination(project: Project) {
    let init = project.root.join("src/pkg/__init__.py");
    std::fs::create_dir_all(init.parent().expect("parent")).expect("create package");
    std::fs::write(&init, b"").expect("write package");

    let mut stderr = Vec::new();
    let mut hook = DownloadHook::new(
        context(&project.root, "linux-x86_64"),
        config("[targets.generated]\nextract_to = 'src/pkg'\nurl = 'https://example.com/g.zip'\n"),
        HookServices::system(),
        &mut stderr,
    );
    hook.clean(&["standard".to_owned()]).expect("clean");

    assert!(init.is_file());
}

#[rstest]
fn maven_lib_download_installs_headers_and_libraries(project: Project) {
    let libs_url = "https://frcmaven.wpi.edu/release/edu/wpi/first/wpiutil/wpiutil-cpp/2024.1.1/wpiutil-cpp-2024.1.1-linuxx86-64.zip";
    let downloader = StubDownloader::new()
        .serving(HEADERS_URL, headers_zip())
        .serving(
            libs_url,
            zip_bytes(&[
                ("linux/x86-64/shared/libwpiutil.so", b"ELF".as_slice()),
                ("linux/x86-64/shared/libwpiutild.so", b"ELF".as_slice()),
            ]),
        );
    let expected = project.root.join("native/wpiutil/lib/libwpiutil.so").to_string();
    let mut runner = MockCommandRunner::new();
    runner
        .expect_run()
        .times(1)
        .returning(move |_, args| {
            assert_eq!(args, [expected.clone()]);
            Ok(output_with_status(exit_status(0), ""))
        });
    let source = r#"
        [[maven_lib_download]]
        extract_to = "native/wpiutil"
        repo_url = "https://frcmaven.wpi.edu/release"
        group_id = "edu.wpi.first.wpiutil"
        artifact_id = "wpiutil-cpp"
        version = "2024.1.1"
        libs = ["wpiutil"]
    "#;

    let outcome = initialize(
        context(&project.root, "linux-x86_64"),
        config(source),
        &downloader,
        &runner,
        "standard",
    );

    outcome.result.expect("initialize");
    assert_eq!(downloader.requests(), vec![HEADERS_URL.to_owned(), libs_url.to_owned()]);
    assert!(project.root.join("native/wpiutil/include/wpi/util.h").is_file());
    assert!(project.root.join("native/wpiutil/lib/libwpiutil.so").is_file());
    assert!(!project.root.join("native/wpiutil/lib/libwpiutild.so").exists());
}
