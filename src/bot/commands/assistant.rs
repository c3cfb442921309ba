//! Assistant Discord commands - streamed chat, spoken answers and realtime voice.
//!
//! The assistant is free to use. Chat replies are streamed into one message
//! that is edited as tokens arrive.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData,
            util::{self, author},
        },
        core::{
            assistant,
            audio::{self, Clip},
            live::{LiveSession, LiveTranscript, TimelineSink},
        },
        errors::{Error, Result},
        genai::live::{INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE},
    };
    use poise::serenity_prelude as serenity;
    use std::{sync::Arc, time::Duration};
    use tokio::{sync::mpsc, time::Instant};
    use tracing::{info, warn};

    /// Minimum gap between edits of a streaming reply
    const EDIT_INTERVAL: Duration = Duration::from_millis(1_000);

    /// How long the voice assistant may take to answer
    const VOICE_TURN_TIMEOUT: Duration = Duration::from_secs(60);

    fn wav_attachment(clip: &Clip, filename: &str) -> serenity::CreateAttachment {
        serenity::CreateAttachment::bytes(audio::encode_wav(clip), filename.to_string())
    }

    /// Asks the assistant about your menu, photography or the studio.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ask(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Your question"] message: String,
        #[description = "Also read the answer aloud"] speak: Option<bool>,
    ) -> Result<()> {
        let (user_id, _) = author(ctx);
        let studio = Arc::clone(&ctx.data().studio);
        let genai = Arc::clone(&ctx.data().genai);

        let Some(history) = studio.begin_chat(&user_id, &message).await else {
            ctx.say("⏳ Still answering your previous question.")
                .await?;
            return Ok(());
        };

        let handle = match ctx.say("💭 …").await {
            Ok(handle) => handle,
            Err(e) => {
                studio.abandon_chat(&user_id).await;
                return Err(e.into());
            }
        };
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let streaming = async {
            let tx = tx;
            assistant::stream_reply(genai.as_ref(), &history, &message, |token| {
                // the editor stops listening only once the stream is done
                let _ = tx.send(token.to_string());
            })
            .await
        };

        let editor = async {
            let mut shown = String::new();
            let mut last_edit = Instant::now();
            while let Some(token) = rx.recv().await {
                shown.push_str(&token);
                if last_edit.elapsed() >= EDIT_INTERVAL {
                    let edit = poise::CreateReply::default()
                        .content(util::truncate_message(&format!("{shown} ▌")));
                    if let Err(e) = handle.edit(ctx, edit).await {
                        warn!("Failed to update streaming reply: {e}");
                    }
                    last_edit = Instant::now();
                }
            }
            shown
        };

        let (result, shown) = tokio::join!(streaming, editor);

        let full = match result {
            Ok(full) => full,
            Err(e) => {
                studio.abandon_chat(&user_id).await;
                let content = if shown.is_empty() {
                    "❌ The assistant could not answer.".to_string()
                } else {
                    format!("{shown}\n\n*(interrupted)*")
                };
                handle
                    .edit(
                        ctx,
                        poise::CreateReply::default().content(util::truncate_message(&content)),
                    )
                    .await?;
                return Err(e);
            }
        };

        studio.finish_chat(&user_id, &full).await;

        let content = if full.trim().is_empty() {
            "🤔 The assistant had nothing to say.".to_string()
        } else {
            util::truncate_message(&full)
        };
        handle
            .edit(ctx, poise::CreateReply::default().content(content))
            .await?;

        if speak.unwrap_or(false) && !full.trim().is_empty() {
            let clip = assistant::synthesize(genai.as_ref(), &full).await?;
            let start = {
                let mut session = studio.lock(&user_id).await;
                let now = session.timeline.now();
                session.timeline.schedule(clip.clone(), now)
            };
            info!(user_id, start_ms = start.as_millis(), "Answer scheduled for playback");
            ctx.send(
                poise::CreateReply::default()
                    .content("🔊 Spoken answer")
                    .attachment(wav_attachment(&clip, "answer.wav")),
            )
            .await?;
        }
        Ok(())
    }

    async fn converse(
        live: &mut LiveSession<TimelineSink>,
        samples: &[i16],
    ) -> Result<LiveTranscript> {
        live.send_audio(samples).await?;
        live.end_audio().await?;
        live.run_turn(VOICE_TURN_TIMEOUT).await
    }

    /// Talks to the assistant: send a WAV recording, get a spoken answer.
    #[poise::command(slash_command)]
    pub async fn voice(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "WAV recording of your question"] recording: serenity::Attachment,
    ) -> Result<()> {
        let upload = util::download(&recording).await?;
        let input = audio::decode_wav(&upload.data)?.resampled(INPUT_SAMPLE_RATE);
        if input.samples.is_empty() {
            ctx.say("❌ The recording is silent.").await?;
            return Ok(());
        }
        ctx.defer().await?;

        let mut live = LiveSession::new(TimelineSink::default());
        live.open(ctx.data().live.as_ref()).await?;
        let turn = converse(&mut live, &input.samples).await;
        live.close().await;
        let transcript = turn?;

        let answer = live.into_sink().timeline.render(OUTPUT_SAMPLE_RATE);
        let mut content = format!(
            "🗣️ **You:** {}\n🤖 **Assistant:** {}",
            if transcript.user.is_empty() { "…" } else { transcript.user.as_str() },
            if transcript.assistant.is_empty() {
                "…"
            } else {
                transcript.assistant.as_str()
            }
        );
        content = util::truncate_message(&content);

        let mut reply = poise::CreateReply::default().content(content);
        if !answer.samples.is_empty() {
            reply = reply.attachment(wav_attachment(&answer, "voice-answer.wav"));
        }
        ctx.send(reply).await?;
        Ok(())
    }

    /// Clears the assistant conversation and its audio.
    #[poise::command(slash_command)]
    pub async fn forget(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let (user_id, _) = author(ctx);
        ctx.data()
            .studio
            .with_session(&user_id, |session| {
                session.conversation.clear();
                session.timeline.clear();
            })
            .await;
        ctx.say("🧽 Conversation cleared.").await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
