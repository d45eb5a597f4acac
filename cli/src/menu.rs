//! Interactive menu driving the subject, the investor directory and the
//! update pipeline from line-based input.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, bail};
use common::logger::{TraceId, root_span};
use notifier::{InvestorDirectory, NotificationSubject, NotifierError, ObserverHandle};
use pipeline::{CancelToken, LineSource, PipelineReport, UpdatePipeline};
use tokio::sync::Mutex;
use tracing::{Instrument, info, warn};

pub struct Menu<S> {
    subject: Arc<NotificationSubject>,
    directory: InvestorDirectory,
    pipeline: UpdatePipeline,
    /// Investors subscribed during this session. The registry only holds weak
    /// references, so these handles keep the observers alive.
    subscribed: HashMap<String, ObserverHandle>,
    /// Shared with pipeline runs, which read their update lines from it.
    input: Arc<Mutex<S>>,
}

impl<S: LineSource + 'static> Menu<S> {
    pub fn new(
        subject: Arc<NotificationSubject>,
        directory: InvestorDirectory,
        pipeline: UpdatePipeline,
        input: S,
    ) -> Self {
        Self {
            subject,
            directory,
            pipeline,
            subscribed: HashMap::new(),
            input: Arc::new(Mutex::new(input)),
        }
    }

    /// Runs until the user exits, input ends, or Ctrl-C arrives while the menu
    /// is waiting for a choice.
    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            print_menu();

            let line = tokio::select! {
                biased;
                Ok(()) = tokio::signal::ctrl_c() => {
                    println!("\nReceived interrupt... shutting down.");
                    break;
                }
                line = self.input.next_line() => line?,
            };

            let Some(line) = line else {
                info!("input closed; leaving menu");
                break;
            };

            let result = match line.trim() {
                "1" => {
                    self.create_investor()
                        .instrument(root_span("create_investor", &TraceId::new()))
                        .await
                }
                "2" => {
                    self.subscribe()
                        .instrument(root_span("subscribe_investor", &TraceId::new()))
                        .await
                }
                "3" => self.run_updates().await,
                "4" => {
                    self.unsubscribe()
                        .instrument(root_span("unsubscribe_investor", &TraceId::new()))
                        .await
                }
                "5" => {
                    println!("Exiting...");
                    break;
                }
                _ => {
                    println!("Unknown choice, try again.");
                    continue;
                }
            };

            if let Err(e) = result {
                warn!(error = %format!("{e:#}"), "menu action failed");
                println!("Error: {e:#}");
            }
        }

        Ok(())
    }

    async fn ask(&mut self, prompt: &str) -> anyhow::Result<String> {
        println!("{prompt}");

        match self.input.next_line().await? {
            Some(line) => Ok(line.trim().to_string()),
            None => bail!("input closed"),
        }
    }

    async fn create_investor(&mut self) -> anyhow::Result<()> {
        let name = self.ask("Enter investor name:").await?;
        let raw = self.ask("Enter threshold:").await?;
        let threshold: f64 = raw
            .parse()
            .with_context(|| format!("invalid threshold {raw:?}"))?;
        let kind = self.ask("Enter investor type:").await?;

        let investor = self.directory.create(&name, threshold, &kind).await?;
        println!("Investor {} created successfully", investor.id);
        Ok(())
    }

    async fn list_investors(&self) -> anyhow::Result<()> {
        let investors = self.directory.list().await?;

        if investors.is_empty() {
            println!("No investors found");
            return Ok(());
        }

        println!("{}", "-".repeat(50));
        println!("{:<10} | {:<15} | {:<10} | {:<10}", "ID", "Name", "Threshold", "Type");
        println!("{}", "-".repeat(50));
        for inv in investors {
            let marker = if self.subscribed.contains_key(&inv.id) { "*" } else { "" };
            println!(
                "{:<10} | {:<15} | {:<10.2} | {:<10}{marker}",
                inv.id, inv.name, inv.threshold, inv.kind
            );
        }
        Ok(())
    }

    async fn subscribe(&mut self) -> anyhow::Result<()> {
        self.list_investors().await?;
        let id = self.ask("Enter investor ID to subscribe:").await?;

        let investor = self.directory.load(&id).await?;
        let handle: ObserverHandle = Arc::new(investor);
        self.subject.register(&handle).await?;
        self.subscribed.insert(id.clone(), handle);

        println!("Investor {id} subscribed successfully");
        Ok(())
    }

    async fn unsubscribe(&mut self) -> anyhow::Result<()> {
        self.list_investors().await?;
        let id = self.ask("Enter investor ID to unsubscribe:").await?;

        let investor = self.directory.load(&id).await?;

        match self.subscribed.remove(&investor.id) {
            Some(handle) => {
                self.subject.remove(handle.as_ref()).await?;
                println!("Investor {id} unsubscribed successfully");
                Ok(())
            }
            None => {
                // Still clear any identity left in the store by an earlier session.
                self.subject.registry().remove_id(&id).await?;
                Err(NotifierError::ObserverNotFound(id).into())
            }
        }
    }

    async fn run_updates(&mut self) -> anyhow::Result<()> {
        let raw = self.ask("Enter number of updates:").await?;
        let count: usize = raw
            .parse()
            .with_context(|| format!("invalid number of updates {raw:?}"))?;

        let cancel = CancelToken::new();
        let run = self.pipeline.run(self.input.clone(), count, &cancel);
        tokio::pin!(run);

        let report = tokio::select! {
            report = &mut run => report,
            Ok(()) = tokio::signal::ctrl_c() => {
                println!("\nInterrupt received; stopping updates.");
                cancel.cancel();
                run.await
            }
        };

        print_report(&report, count);
        Ok(())
    }
}

fn print_menu() {
    println!("\n=================== STOCK OBSERVER ===================");
    println!("1) Create Investor");
    println!("2) Subscribe Investor");
    println!("3) Run Concurrent Stock Updates");
    println!("4) Unsubscribe Investor");
    println!("5) Exit");
    println!("Your choice:");
}

fn print_report(report: &PipelineReport, count: usize) {
    println!(
        "Updates {}: {}/{} applied (trace {})",
        report.termination, report.applied, count, report.trace_id
    );

    if let Some(e) = &report.producer_error {
        println!("Input stopped early: {e}");
    }
    if report.abandoned {
        println!("Some work was still running when the run was abandoned.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::PipelineConfig;
    use store::keys::{INVESTORS_SET, OBSERVERS_SET, price_key};
    use store::{InMemoryStore, PriceStore};
    use tokio::sync::mpsc;

    async fn menu_with(
        lines: &[&str],
    ) -> (Arc<InMemoryStore>, Menu<mpsc::Receiver<String>>) {
        let store = Arc::new(InMemoryStore::new());
        let subject = Arc::new(NotificationSubject::new(0.0, store.clone()).unwrap());
        let pipeline = UpdatePipeline::new(subject.clone(), PipelineConfig::default());
        let directory = InvestorDirectory::new(store.clone());

        let (tx, rx) = mpsc::channel(lines.len().max(1));
        for line in lines {
            tx.send(line.to_string()).await.unwrap();
        }

        (store, Menu::new(subject, directory, pipeline, rx))
    }

    #[tokio::test]
    async fn session_creates_investor_and_applies_updates() {
        let (store, menu) = menu_with(&[
            "1", "ada", "5", "retail", // create
            "3", "2", "AAA 10", "BBB 20", // two updates
            "4", "000000", // unknown investor: error, loop continues
            "9",      // unknown choice
            "5",
        ])
        .await;

        menu.run().await.unwrap();

        assert_eq!(store.list_set_members(INVESTORS_SET).await.unwrap().len(), 1);
        assert_eq!(store.scalar(&price_key("AAA")).as_deref(), Some("10.00"));
        assert_eq!(store.scalar(&price_key("BBB")).as_deref(), Some("20.00"));
    }

    #[tokio::test]
    async fn subscribe_then_unsubscribe_round_trip() {
        let (store, mut menu) = menu_with(&[]).await;
        let investor = menu.directory.create("bob", 1.0, "fund").await.unwrap();

        let (tx, rx) = mpsc::channel(4);
        tx.send(investor.id.clone()).await.unwrap();
        tx.send(investor.id.clone()).await.unwrap();
        menu.input = Arc::new(Mutex::new(rx));

        menu.subscribe().await.unwrap();
        assert!(menu.subject.registry().contains(&investor.id));
        assert_eq!(
            store.list_set_members(OBSERVERS_SET).await.unwrap(),
            vec![investor.id.clone()]
        );

        menu.unsubscribe().await.unwrap();
        assert!(menu.subject.registry().is_empty());
        assert!(store.list_set_members(OBSERVERS_SET).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsubscribing_an_unsubscribed_investor_reports_not_found() {
        let (_store, mut menu) = menu_with(&[]).await;
        let investor = menu.directory.create("cy", 1.0, "retail").await.unwrap();

        let (tx, rx) = mpsc::channel(1);
        tx.send(investor.id.clone()).await.unwrap();
        menu.input = Arc::new(Mutex::new(rx));

        let err = menu.unsubscribe().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NotifierError>(),
            Some(NotifierError::ObserverNotFound(id)) if *id == investor.id
        ));
    }

    #[tokio::test]
    async fn closed_input_ends_the_session() {
        let (_store, menu) = menu_with(&[]).await;
        menu.run().await.unwrap();
    }
}
