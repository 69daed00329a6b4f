use std::{
    io::{self, Write},
    time::Duration,
};

use anyhow::Result;

use crate::{
    backend::{document_store::InMemoryDocumentStore, InMemoryPlatform},
    cli::{Cli, Command},
    domain::{
        self,
        events::{ScreenEvent, UserAction},
    },
    infra::{self, error::AppError},
    ui::{self, console, StdinActionSource},
    usecases::{
        self,
        background::{self, BackgroundHandler, BackgroundHandlerGuard},
        bootstrap,
        chat_screen::ChatScreen,
        context::AppContext,
        contracts::{RawPush, UserActionSource},
    },
};

const RENDER_FAILED: &str = "RENDER_FAILED";
const BACKGROUND_PUSH_HANDLED: &str = "BACKGROUND_PUSH_HANDLED";
const DEMO_STEP: &str = "DEMO_STEP";

/// How long the demo waits for feed and push deliveries to stop arriving.
const DEMO_SETTLE: Duration = Duration::from_millis(50);

pub fn run(cli: Cli) -> Result<()> {
    let (context, _log_guard) = bootstrap::bootstrap(cli.config.as_deref())?;

    tracing::debug!(
        ui = ui::module_name(),
        domain = domain::module_name(),
        backend = crate::backend::module_name(),
        usecases = usecases::module_name(),
        infra = infra::module_name(),
        "module boundaries loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AppError::RuntimeBuild)?;
    let _background = install_background_handler(&context.platform)?;

    let outcome = match cli.command_or_default() {
        Command::Run => runtime.block_on(run_screen(&context)),
        Command::Demo => runtime.block_on(run_demo(&context, &mut io::stdout())),
    };

    // A pending stdin read would otherwise hold shutdown open.
    runtime.shutdown_background();
    outcome
}

/// Logs pushes that arrive while no chat screen is listening.
struct LoggingBackgroundHandler {
    platform: InMemoryPlatform,
}

impl BackgroundHandler for LoggingBackgroundHandler {
    fn handle(&mut self, push: RawPush) {
        tracing::info!(
            code = BACKGROUND_PUSH_HANDLED,
            has_body = push.body.is_some(),
            stored_messages = self.platform.documents().document_count(),
            "push handled in background"
        );
    }
}

fn install_background_handler(platform: &InMemoryPlatform) -> Result<BackgroundHandlerGuard> {
    let platform = platform.clone();
    let guard = background::install(move || {
        let handler = LoggingBackgroundHandler {
            platform: platform.connect()?,
        };
        Ok(Box::new(handler) as Box<dyn BackgroundHandler>)
    })?;

    Ok(guard)
}

async fn run_screen(context: &AppContext) -> Result<()> {
    let channel = context.push_channel();
    let mut screen = ChatScreen::activate(context.message_store(), &channel).await;
    let mut input = StdinActionSource::stdin(context.platform.clone());
    let mut stdout = io::stdout();

    screen
        .run(&mut input, |state| {
            if let Err(error) = console::render(&mut stdout, state) {
                tracing::warn!(code = RENDER_FAILED, error = %error, "screen render failed");
            }
        })
        .await?;
    writeln!(stdout)?;

    Ok(())
}

/// Input that never produces an action.
struct NoInput;

impl UserActionSource for NoInput {
    async fn next_action(&mut self) -> Result<Option<UserAction>> {
        std::future::pending().await
    }
}

/// Scripted session: two sends, an acknowledged alert, an opened
/// notification, then a message stored after the screen is gone.
async fn run_demo(context: &AppContext, out: &mut impl Write) -> Result<()> {
    let channel = context.push_channel();
    let mut screen = ChatScreen::activate(context.message_store(), &channel).await;
    settle(&mut screen).await?;
    console::render(out, screen.state())?;
    writeln!(out)?;

    for text in ["Hello from the demo", "Second message"] {
        demo_step(out, &format!("send {text:?}"));
        screen
            .handle_event(ScreenEvent::User(UserAction::Edit(text.to_owned())))
            .await?;
        screen.handle_event(ScreenEvent::User(UserAction::Send)).await?;
        settle(&mut screen).await?;
        console::render(out, screen.state())?;
        writeln!(out)?;

        demo_step(out, "acknowledge alert");
        screen
            .handle_event(ScreenEvent::User(UserAction::AcknowledgeAlert))
            .await?;
    }

    let first = screen
        .state()
        .feed()
        .snapshot()
        .and_then(|snapshot| snapshot.messages().first())
        .map(|message| message.id.clone());
    demo_step(out, "open notification for the first message");
    context.platform.open_notification(first.as_ref());
    settle(&mut screen).await?;
    console::render(out, screen.state())?;
    writeln!(out)?;

    demo_step(out, "leave the screen, then receive a message");
    screen.deactivate();
    context.message_store().append("Sent while away").await?;
    console::render(out, screen.state())?;
    writeln!(out)?;

    Ok(())
}

/// Handles every event that arrives before the sources go quiet.
async fn settle(screen: &mut ChatScreen<InMemoryDocumentStore>) -> Result<()> {
    loop {
        let next = tokio::time::timeout(DEMO_SETTLE, screen.next_event(&mut NoInput)).await;
        let Ok(event) = next else {
            return Ok(());
        };
        screen.handle_event(event?).await?;
    }
}

fn demo_step(out: &mut impl Write, step: &str) {
    tracing::info!(code = DEMO_STEP, step, "demo step");
    let _ = writeln!(out, "# {step}");
}
