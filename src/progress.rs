use log::debug;

/// Processing stages, in the order a report run goes through them
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Dates,
    Metrics,
    NewUsers,
    Rendering,
    Done,
}

impl Stage {
    pub fn percent(self) -> u8 {
        match self {
            Stage::Dates => 10,
            Stage::Metrics => 30,
            Stage::NewUsers => 60,
            Stage::Rendering => 80,
            Stage::Done => 100,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Stage::Dates => "Procesando fechas...",
            Stage::Metrics => "Calculando métricas...",
            Stage::NewUsers => "Detectando nuevos usuarios...",
            Stage::Rendering => "Visualizando resultados...",
            Stage::Done => "Proceso completado",
        }
    }
}

/// Receives progress updates while a report is being built
pub trait ProgressSink {
    fn update(&mut self, stage: Stage);
}

/// Sink that only writes stage transitions to the debug log
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn update(&mut self, stage: Stage) {
        debug!("[{:>3}%] {}", stage.percent(), stage.message());
    }
}

impl<F: FnMut(Stage)> ProgressSink for F {
    fn update(&mut self, stage: Stage) {
        self(stage)
    }
}
