//! Model metadata.
//!
//! Informational data carried alongside the ensemble. None of it changes raw
//! scores; it tells callers how to read them.

/// Type of task the ensemble was trained for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskKind {
    /// Regression (raw score is the target, possibly in a transformed space).
    #[default]
    Regression,
    /// Binary classification; the single raw score is log-odds of the positive class.
    BinaryClassification,
    /// Multi-class classification with one raw score per class.
    MulticlassClassification {
        n_classes: usize,
    },
}

impl TaskKind {
    /// Number of output lanes this task produces.
    pub fn n_outputs(&self) -> usize {
        match self {
            Self::Regression | Self::BinaryClassification => 1,
            Self::MulticlassClassification { n_classes } => *n_classes,
        }
    }

    pub fn is_classification(&self) -> bool {
        matches!(
            self,
            Self::BinaryClassification | Self::MulticlassClassification { .. }
        )
    }

    /// Number of class labels, if this is a classification task.
    pub fn n_classes(&self) -> Option<usize> {
        match self {
            Self::Regression => None,
            Self::BinaryClassification => Some(2),
            Self::MulticlassClassification { n_classes } => Some(*n_classes),
        }
    }
}

/// Metadata shared by every model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelMeta {
    pub task: TaskKind,
    /// Training objective name (e.g. "RMSE", "MultiClass"), for introspection only.
    pub objective: Option<String>,
    /// Class labels in output-lane order.
    pub class_names: Option<Vec<String>>,
    /// Free-form key/value attributes.
    pub attributes: Vec<(String, String)>,
}

impl ModelMeta {
    pub fn for_regression() -> Self {
        Self::default()
    }

    pub fn for_binary_classification() -> Self {
        Self {
            task: TaskKind::BinaryClassification,
            ..Default::default()
        }
    }

    pub fn for_multiclass(n_classes: usize) -> Self {
        Self {
            task: TaskKind::MulticlassClassification { n_classes },
            ..Default::default()
        }
    }

    pub fn with_class_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.class_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = Some(objective.into());
        self
    }

    /// Check the metadata against the ensemble's output count.
    pub(crate) fn validate(&self, n_outputs: usize) -> Result<(), String> {
        if self.task.n_outputs() != n_outputs {
            return Err(format!(
                "task {:?} expects {} outputs, ensemble has {}",
                self.task,
                self.task.n_outputs(),
                n_outputs
            ));
        }
        if let Some(names) = &self.class_names {
            match self.task.n_classes() {
                Some(n) if n == names.len() => {}
                Some(n) => {
                    return Err(format!("{} class names for {} classes", names.len(), n));
                }
                None => return Err("class names on a regression model".into()),
            }
        }
        Ok(())
    }
}
