use crate::config::{LogFormat, Logging};
use tracing::subscriber::set_global_default;
use tracing_error::ErrorLayer;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, Layer, Registry};

pub(super) fn init_tracing(logging: &Logging) -> color_eyre::Result<()> {
    color_eyre::install()?;

    LogTracer::init()?;

    let fmt_span = if logging.log_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let format_layer = tracing_subscriber::fmt::layer().with_span_events(fmt_span);

    match logging.format {
        LogFormat::Compact => with_format(format_layer.compact(), logging),
        LogFormat::Json => with_format(format_layer.json(), logging),
        LogFormat::Normal => with_format(format_layer, logging),
        LogFormat::Pretty => with_format(format_layer.pretty(), logging),
    }
}

fn with_format<F>(format_layer: F, logging: &Logging) -> color_eyre::Result<()>
where
    F: Layer<Registry> + Send + Sync,
{
    let format_layer = format_layer.with_filter(logging.targets.targets.clone());

    let subscriber = Registry::default()
        .with(format_layer)
        .with(ErrorLayer::default());

    set_global_default(subscriber)?;

    Ok(())
}
