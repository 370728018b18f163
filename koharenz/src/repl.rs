//! Line-oriented chat loop.
//!
//! Lines starting with `/` are commands, anything else goes to the routed
//! persona and is streamed back. Failures are printed with an `[ERROR]` tag
//! and the loop continues.

use crossterm::style::Stylize;
use koharenz_core::persist::AnalysisRecord;
use koharenz_core::{Command, LanguageModel, PlatformError, PlatformSession};
use std::io::{self, Write};

pub async fn run<M: LanguageModel>(session: &mut PlatformSession<M>) -> anyhow::Result<()> {
    print_banner(session);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("{} ", format!("{}>", session.locale().t("app.prompt")).bold());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                let error = e.to_string();
                print_error(&session.locale().t_with("cmd.error", &[("error", error.as_str())]));
                println!("{}", session.locale().t("cmd.help"));
                continue;
            }
        };

        if matches!(command, Command::Quit) {
            break;
        }
        if let Err(e) = dispatch(session, command).await {
            report(session, &e);
        }
        println!();
    }

    println!("{}", session.locale().t("app.goodbye"));
    Ok(())
}

async fn dispatch<M: LanguageModel>(
    session: &mut PlatformSession<M>,
    command: Command,
) -> Result<(), PlatformError> {
    let locale = session.locale().clone();
    match command {
        Command::Prompt(text) => {
            let mut stdout = io::stdout();
            let reply = session
                .prompt(&text, |delta| {
                    print!("{delta}");
                    stdout.flush().ok();
                })
                .await?;
            println!();
            let persona = reply.persona.display_name(session.language());
            println!(
                "{}",
                locale.t_with("chat.persona", &[("persona", persona)]).dark_grey()
            );
        }
        Command::Lang(language) => {
            session.set_language(language)?;
            println!(
                "{}",
                session
                    .locale()
                    .t_with("lang.switched", &[("language", language.name())])
            );
        }
        Command::Learn(topic) => {
            println!("{}", locale.t_with("learn.header", &[("topic", topic.as_str())]).bold());
            let reply = session.learn(&topic).await?;
            println!("\n{}", reply.text);
        }
        Command::Research(query) => {
            println!("{}", locale.t_with("research.header", &[("query", query.as_str())]).bold());
            let reply = session.research(&query).await?;
            println!("\n{}", reply.text);
        }
        Command::Analyze(text) => {
            let record = session.analyze(&text).await?;
            print_analysis(session, &record);
        }
        Command::Clear => {
            session.clear();
            println!("{}", locale.t("chat.cleared"));
        }
        Command::Export(path) => {
            let path = path.unwrap_or_else(|| session.default_export_path());
            let written = session.export(&path).await?;
            println!(
                "{}",
                locale
                    .t_with("chat.exported", &[("path", written.display().to_string().as_str())])
                    .green()
            );
        }
        Command::Help => println!("{}", locale.t("cmd.help")),
        Command::Quit => {}
    }
    Ok(())
}

fn print_banner<M: LanguageModel>(session: &PlatformSession<M>) {
    let locale = session.locale();
    println!("{}", locale.t("app.title").bold());
    println!("{}", locale.t("app.welcome"));
    if !session.conversation().is_empty() {
        println!("({} / {})", session.session_id(), session.conversation().len());
    }
    println!();
}

fn print_analysis<M: LanguageModel>(session: &PlatformSession<M>, record: &AnalysisRecord) {
    let locale = session.locale();
    let report = &record.report;
    println!("{}", locale.t("analyze.header").bold());
    println!(
        "{}",
        locale.t_with(
            "analyze.metrics",
            &[
                ("density", format!("{:.2}", report.contradiction_density).as_str()),
                ("phi", format!("{:.2}", report.phi_estimate).as_str()),
                ("trajectory", format!("{:.2}", report.integration_trajectory).as_str()),
            ],
        )
    );
    for perspective in &record.perspectives {
        let persona = perspective.persona.display_name(record.language);
        println!(
            "\n{}",
            locale
                .t_with("analyze.perspective", &[("persona", persona)])
                .cyan()
                .bold()
        );
        println!("{}", perspective.content.trim());
    }
    println!("\n{}", locale.t("analyze.synthesis").cyan().bold());
    println!("{}", record.synthesis.trim());
}

fn report<M: LanguageModel>(session: &PlatformSession<M>, error: &PlatformError) {
    tracing::warn!(%error, "command failed");
    let message = match error {
        PlatformError::Model(e) => session
            .locale()
            .t_with("error.llm", &[("message", e.to_string().as_str())]),
        other => other.to_string(),
    };
    print_error(&message);
}

fn print_error(message: &str) {
    println!("{} {message}", "[ERROR]".red().bold());
}
